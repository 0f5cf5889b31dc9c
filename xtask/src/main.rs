use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array1, Array2, ArrayD};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sptk_rs::kernel::KernelLifecycle;
use sptk_rs::signal::{
    all_pole_to_all_zero, frequency_response, group_delay, phase, spectrum, Coefficients,
    FrequencyResponseConfig, FrequencyResponseKernel, FrequencyResponseNd, GroupDelayConfig,
    GroupDelayKernel, GroupDelayNd, PhaseConfig, PhaseKernel, PhaseNd, Polynomial,
    SpectrumConfig, SpectrumFormat, SpectrumKernel, SpectrumNd,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const DEFAULT_PYTHON_BIN: &str = "python";
const FFT_LENGTH: usize = 512;

const PY_SPECTRAL_SCRIPT: &str = r#"
import json
import sys
import time
import numpy as np

env = json.loads(sys.stdin.read())
op = env["op"]
iters = int(env["iters"])
p = env["payload"]

def _poly(key):
    v = p.get(key)
    return None if v is None else np.asarray(v, dtype=float)

def _response(b, a, L):
    h = 1.0
    if b is not None:
        h = np.fft.rfft(b, n=L)
    if a is not None:
        h = h / np.fft.rfft(a, n=L)
    return h

def _spec(b, a, L):
    s = 1.0
    if b is not None:
        s = np.abs(np.fft.rfft(b, n=L)) ** 2
    if a is not None:
        s = s / np.abs(np.fft.rfft(a, n=L)) ** 2
    s = s + float(p["eps"])
    rf = p.get("relative_floor")
    if rf is not None:
        m = np.max(s, axis=-1, keepdims=True)
        s = np.maximum(s, m * 10.0 ** (float(rf) / 10.0))
    fmt = p["out_format"]
    if fmt == "db":
        return 10.0 * np.log10(s)
    if fmt == "log-magnitude":
        return 0.5 * np.log(s)
    if fmt == "magnitude":
        return np.sqrt(s)
    return s

def _phase(b, a, L):
    theta = np.angle(_response(b, a, L)) / np.pi
    theta = np.where(theta == -1.0, 1.0, theta)
    if p["unwrap"]:
        theta = np.unwrap(theta, period=2.0, axis=-1)
    return theta

def _grpdelay_lane(b, a, L, alpha, gamma):
    if a is None:
        c, m = b, 0
    elif b is None:
        c, m = a[::-1], len(a) - 1
    else:
        c, m = np.convolve(b, a[::-1]), len(a) - 1
    C = np.fft.rfft(c, n=L)
    dC = np.fft.rfft(np.arange(len(c)) * c, n=L)
    power = np.maximum(np.abs(C) ** (2.0 * gamma), np.finfo(float).tiny)
    tau = (dC.real * C.real + dC.imag * C.imag) / power - m
    if alpha != 1.0:
        tau = np.sign(tau) * np.abs(tau) ** alpha
    return tau

def _grpdelay(b, a, L):
    alpha, gamma = float(p["alpha"]), float(p["gamma"])
    if b is not None and b.ndim == 2:
        return np.stack([_grpdelay_lane(row, a, L, alpha, gamma) for row in b])
    return _grpdelay_lane(b, a, L, alpha, gamma)

def _compute():
    b, a = _poly("b"), _poly("a")
    L = int(p.get("fft_length", 0))
    if op == "freqresp":
        h = _response(b, a, L)
        return np.stack([h.real, h.imag], axis=-1)
    if op == "spec":
        return _spec(b, a, L)
    if op == "phase":
        return _phase(b, a, L)
    if op == "grpdelay":
        return _grpdelay(b, a, L)
    if op == "norm0":
        return np.concatenate([1.0 / a[..., :1], a[..., 1:] / a[..., :1]], axis=-1)
    raise RuntimeError(f"unsupported op: {op}")

y = np.asarray(_compute(), dtype=float).reshape(-1)

t0 = time.perf_counter_ns()
for _ in range(iters):
    _compute()
t1 = time.perf_counter_ns()

print(json.dumps({
    "output": y.tolist(),
    "avg_ns": (t1 - t0) / max(iters, 1),
    "python_version": sys.version.split()[0],
    "numpy_version": np.__version__
}))
"#;

#[derive(Debug, Serialize, Deserialize, Clone)]
struct PythonEval {
    output: Vec<f64>,
    avg_ns: f64,
    python_version: String,
    numpy_version: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ContractRow {
    case_id: String,
    config: serde_json::Value,
    pearson_r: f64,
    mae: f64,
    rmse: f64,
    max_abs: f64,
    rust_kernel_ns: f64,
    rust_oneshot_ns: f64,
    python_ns: f64,
    speedup_vs_oneshot: f64,
    speedup_vs_python: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContractBundle {
    generated_epoch_seconds: u64,
    python_executable: String,
    python_version: String,
    numpy_version: String,
    rows: Vec<ContractRow>,
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("contracts") => run_contracts(),
        _ => {
            eprintln!("Usage:");
            eprintln!("  cargo run -p xtask -- contracts");
            Ok(())
        }
    }
}

/// Synthetic numerator lanes: decaying, sign-alternating FIR taps.
fn numerator_batch(lanes: usize, taps: usize) -> Array2<f64> {
    Array2::from_shape_fn((lanes, taps), |(lane, n)| {
        let x = (n + 1) as f64 / (3.0 + lane as f64);
        (-x).exp() * (1.7 * x + lane as f64).cos()
    })
}

/// Stable fourth-order LPC-style denominator.
fn denominator() -> Array1<f64> {
    Array1::from(vec![1.0, -1.2, 0.8, -0.3, 0.05])
}

fn nested(x: &Array2<f64>) -> Vec<Vec<f64>> {
    x.outer_iter().map(|row| row.to_vec()).collect()
}

fn flatten(x: &ArrayD<f64>) -> Vec<f64> {
    x.iter().copied().collect()
}

fn run_contracts() -> Result<()> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let out_dir = PathBuf::from(format!("target/contracts/{ts}"));
    fs::create_dir_all(&out_dir).context("creating contract output directory")?;

    let python_bin = detect_python_bin();
    let mut rows = Vec::new();

    let b = numerator_batch(8, 24);
    let a = denominator();
    let no_poly: Option<&Array1<f64>> = None;

    // Complex response, interleaved as [re, im] per bin.
    {
        let case_id = "freqresp_pole_zero_f64";
        let config = FrequencyResponseConfig {
            fft_length: FFT_LENGTH,
        };
        let kernel = FrequencyResponseKernel::<f64>::try_new(config)?;
        let interleave = |h: ArrayD<sptk_rs::num_complex::Complex<f64>>| {
            h.iter().flat_map(|c| [c.re, c.im]).collect::<Vec<_>>()
        };
        let candidate = interleave(
            kernel
                .run_alloc((&b).into(), (&a).into())
                .map_err(|e| anyhow!("freqresp candidate execution failed: {e}"))?,
        );
        let oneshot = interleave(frequency_response(&b, &a, FFT_LENGTH)?);
        let py = python_spectral_eval(
            &python_bin,
            "freqresp",
            json!({ "b": nested(&b), "a": a.to_vec(), "fft_length": FFT_LENGTH }),
            200,
        )?;
        let kernel_ns = benchmark_avg_ns(200, || {
            kernel
                .run_alloc((&b).into(), (&a).into())
                .map(|_| ())
                .map_err(|e| anyhow!("freqresp candidate benchmark failed: {e}"))
        })?;
        let oneshot_ns = benchmark_avg_ns(200, || {
            frequency_response(&b, &a, FFT_LENGTH)?;
            Ok(())
        })?;
        record_case(
            &mut rows,
            CaseInput {
                case_id,
                config: serde_json::to_value(config)?,
                candidate,
                oneshot,
                py,
                kernel_ns,
                oneshot_ns,
            },
        )?;
    }

    // Spectra in every output unit.
    let spectrum_cases = [
        ("spec_power_f64", SpectrumFormat::Power, 0.0, None, true),
        ("spec_db_floor_f64", SpectrumFormat::Db, 0.0, Some(-40.0), true),
        ("spec_logmag_eps_f64", SpectrumFormat::LogMagnitude, 1e-6, None, false),
        ("spec_magnitude_f64", SpectrumFormat::Magnitude, 0.0, Some(-60.0), false),
    ];
    for (case_id, out_format, eps, relative_floor, with_numerator) in spectrum_cases {
        let config = SpectrumConfig {
            fft_length: FFT_LENGTH,
            eps,
            relative_floor,
            out_format,
        };
        let kernel = SpectrumKernel::try_new(config)?;
        let numer: Coefficients<'_, f64> = if with_numerator {
            (&b).into()
        } else {
            Polynomial::Identity
        };
        let run_kernel = || kernel.run_alloc(numer.clone(), (&a).into());
        let run_oneshot = || {
            if with_numerator {
                spectrum(&b, &a, FFT_LENGTH, eps, relative_floor, out_format)
            } else {
                spectrum(no_poly, &a, FFT_LENGTH, eps, relative_floor, out_format)
            }
        };
        let candidate = flatten(
            &run_kernel().map_err(|e| anyhow!("{case_id} candidate execution failed: {e}"))?,
        );
        let oneshot = flatten(&run_oneshot()?);
        let py = python_spectral_eval(
            &python_bin,
            "spec",
            json!({
                "b": with_numerator.then(|| nested(&b)),
                "a": a.to_vec(),
                "fft_length": FFT_LENGTH,
                "eps": eps,
                "relative_floor": relative_floor,
                "out_format": out_format.as_str(),
            }),
            200,
        )?;
        let kernel_ns = benchmark_avg_ns(200, || {
            run_kernel()
                .map(|_| ())
                .map_err(|e| anyhow!("{case_id} candidate benchmark failed: {e}"))
        })?;
        let oneshot_ns = benchmark_avg_ns(200, || {
            run_oneshot()?;
            Ok(())
        })?;
        record_case(
            &mut rows,
            CaseInput {
                case_id,
                config: serde_json::to_value(config)?,
                candidate,
                oneshot,
                py,
                kernel_ns,
                oneshot_ns,
            },
        )?;
    }

    // Wrapped and unwrapped phase.
    for (case_id, unwrap) in [("phase_wrapped_f64", false), ("phase_unwrapped_f64", true)] {
        let config = PhaseConfig {
            fft_length: FFT_LENGTH,
            unwrap,
        };
        let kernel = PhaseKernel::<f64>::try_new(config)?;
        let candidate = flatten(
            &kernel
                .run_alloc((&b).into(), (&a).into())
                .map_err(|e| anyhow!("{case_id} candidate execution failed: {e}"))?,
        );
        let oneshot = flatten(&phase(&b, &a, FFT_LENGTH, unwrap)?);
        let py = python_spectral_eval(
            &python_bin,
            "phase",
            json!({
                "b": nested(&b),
                "a": a.to_vec(),
                "fft_length": FFT_LENGTH,
                "unwrap": unwrap,
            }),
            200,
        )?;
        let kernel_ns = benchmark_avg_ns(200, || {
            kernel
                .run_alloc((&b).into(), (&a).into())
                .map(|_| ())
                .map_err(|e| anyhow!("{case_id} candidate benchmark failed: {e}"))
        })?;
        let oneshot_ns = benchmark_avg_ns(200, || {
            phase(&b, &a, FFT_LENGTH, unwrap)?;
            Ok(())
        })?;
        record_case(
            &mut rows,
            CaseInput {
                case_id,
                config: serde_json::to_value(config)?,
                candidate,
                oneshot,
                py,
                kernel_ns,
                oneshot_ns,
            },
        )?;
    }

    // Group delay and the modified group delay.
    for (case_id, alpha, gamma) in [
        ("grpdelay_f64", 1.0, 1.0),
        ("grpdelay_modified_f64", 0.4, 0.9),
    ] {
        let config = GroupDelayConfig {
            fft_length: FFT_LENGTH,
            alpha,
            gamma,
            eps: f64::MIN_POSITIVE,
        };
        let kernel = GroupDelayKernel::try_new(config)?;
        let candidate = flatten(
            &kernel
                .run_alloc((&b).into(), (&a).into())
                .map_err(|e| anyhow!("{case_id} candidate execution failed: {e}"))?,
        );
        let oneshot = flatten(&group_delay(&b, &a, FFT_LENGTH, alpha, gamma)?);
        let py = python_spectral_eval(
            &python_bin,
            "grpdelay",
            json!({
                "b": nested(&b),
                "a": a.to_vec(),
                "fft_length": FFT_LENGTH,
                "alpha": alpha,
                "gamma": gamma,
            }),
            100,
        )?;
        let kernel_ns = benchmark_avg_ns(200, || {
            kernel
                .run_alloc((&b).into(), (&a).into())
                .map(|_| ())
                .map_err(|e| anyhow!("{case_id} candidate benchmark failed: {e}"))
        })?;
        let oneshot_ns = benchmark_avg_ns(200, || {
            group_delay(&b, &a, FFT_LENGTH, alpha, gamma)?;
            Ok(())
        })?;
        record_case(
            &mut rows,
            CaseInput {
                case_id,
                config: serde_json::to_value(config)?,
                candidate,
                oneshot,
                py,
                kernel_ns,
                oneshot_ns,
            },
        )?;
    }

    // All-pole to all-zero conversion of gain-scaled denominators.
    {
        let case_id = "norm0_f64";
        let gains = Array2::from_shape_fn((8, 5), |(lane, n)| {
            if n == 0 {
                0.5 + lane as f64
            } else {
                a[n]
            }
        });
        let candidate = flatten(&all_pole_to_all_zero(&gains)?);
        let py = python_spectral_eval(&python_bin, "norm0", json!({ "a": nested(&gains) }), 500)?;
        let kernel_ns = benchmark_avg_ns(500, || {
            all_pole_to_all_zero(&gains)?;
            Ok(())
        })?;
        record_case(
            &mut rows,
            CaseInput {
                case_id,
                config: json!({}),
                oneshot: candidate.clone(),
                candidate,
                py,
                kernel_ns,
                oneshot_ns: kernel_ns,
            },
        )?;
    }

    let versions = python_versions(&python_bin)?;
    let bundle = ContractBundle {
        generated_epoch_seconds: ts,
        python_executable: python_bin.display().to_string(),
        python_version: versions.python_version,
        numpy_version: versions.numpy_version,
        rows,
    };

    fs::write(
        out_dir.join("summary.json"),
        serde_json::to_vec_pretty(&bundle).context("serializing contract summary")?,
    )
    .context("writing summary.json")?;
    write_summary_csv(&out_dir.join("summary.csv"), &bundle.rows)?;

    println!("Contracts written:");
    println!("  - {}", out_dir.join("summary.json").display());
    println!("  - {}", out_dir.join("summary.csv").display());
    println!("  - cases: {}", bundle.rows.len());

    Ok(())
}

fn detect_python_bin() -> PathBuf {
    std::env::var_os("PYTHON")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON_BIN))
}

fn python_versions(python_bin: &Path) -> Result<PythonEval> {
    run_python_eval(
        python_bin,
        r#"
import json, sys
import numpy
payload = json.loads(sys.stdin.read())
print(json.dumps({
    "output": [],
    "avg_ns": 0.0,
    "python_version": sys.version.split()[0],
    "numpy_version": numpy.__version__
}))
"#,
        json!({}),
    )
}

fn python_spectral_eval(
    python_bin: &Path,
    op: &str,
    payload: serde_json::Value,
    iters: usize,
) -> Result<PythonEval> {
    run_python_eval(
        python_bin,
        PY_SPECTRAL_SCRIPT,
        json!({
            "op": op,
            "iters": iters,
            "payload": payload
        }),
    )
}

fn run_python_eval(
    python_bin: &Path,
    script: &str,
    payload: serde_json::Value,
) -> Result<PythonEval> {
    let mut child = Command::new(python_bin)
        .arg("-c")
        .arg(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning python interpreter at {}", python_bin.display()))?;

    {
        let stdin = child.stdin.as_mut().context("opening python stdin")?;
        let payload_bytes = serde_json::to_vec(&payload).context("serializing python payload")?;
        stdin
            .write_all(&payload_bytes)
            .context("writing payload to python stdin")?;
    }

    let output = child
        .wait_with_output()
        .context("waiting for python process")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("python execution failed: {stderr}");
    }
    let stdout = String::from_utf8(output.stdout).context("parsing python stdout utf8")?;
    let parsed: PythonEval = serde_json::from_str(stdout.trim()).context("parsing python json")?;
    Ok(parsed)
}

struct CaseInput<'a> {
    case_id: &'a str,
    config: serde_json::Value,
    candidate: Vec<f64>,
    oneshot: Vec<f64>,
    py: PythonEval,
    kernel_ns: f64,
    oneshot_ns: f64,
}

fn record_case(rows: &mut Vec<ContractRow>, case: CaseInput<'_>) -> Result<()> {
    ensure_same_length(case.case_id, &case.candidate, &case.oneshot)?;
    ensure_same_length(case.case_id, &case.candidate, &case.py.output)?;
    if case.candidate != case.oneshot {
        bail!(
            "case {} kernel and one-shot outputs differ (max abs {})",
            case.case_id,
            max_abs_error(&case.candidate, &case.oneshot)
        );
    }

    let reference = &case.py.output;
    rows.push(ContractRow {
        case_id: case.case_id.to_string(),
        config: case.config,
        pearson_r: pearson(&case.candidate, reference),
        mae: mean_abs_error(&case.candidate, reference),
        rmse: root_mean_squared_error(&case.candidate, reference),
        max_abs: max_abs_error(&case.candidate, reference),
        rust_kernel_ns: case.kernel_ns,
        rust_oneshot_ns: case.oneshot_ns,
        python_ns: case.py.avg_ns,
        speedup_vs_oneshot: case.oneshot_ns / case.kernel_ns,
        speedup_vs_python: case.py.avg_ns / case.kernel_ns,
    });
    Ok(())
}

fn ensure_same_length(case_id: &str, a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        bail!(
            "case {case_id} has mismatched output lengths: left={}, right={}",
            a.len(),
            b.len()
        );
    }
    Ok(())
}

fn benchmark_avg_ns<F>(iters: usize, mut f: F) -> Result<f64>
where
    F: FnMut() -> Result<()>,
{
    let start = Instant::now();
    for _ in 0..iters {
        f()?;
    }
    Ok(start.elapsed().as_nanos() as f64 / iters as f64)
}

fn mean_abs_error(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .sum::<f64>()
        / a.len() as f64
}

fn root_mean_squared_error(a: &[f64], b: &[f64]) -> f64 {
    (a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        / a.len() as f64)
        .sqrt()
}

fn max_abs_error(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = *x - mean_a;
        let db = *y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        if a == b {
            1.0
        } else {
            0.0
        }
    } else {
        cov / (var_a.sqrt() * var_b.sqrt())
    }
}

fn write_summary_csv(path: &Path, rows: &[ContractRow]) -> Result<()> {
    let mut out = String::new();
    out.push_str("case_id,pearson_r,mae,rmse,max_abs,rust_kernel_ns,rust_oneshot_ns,python_ns,speedup_vs_oneshot,speedup_vs_python\n");
    for row in rows {
        out.push_str(&format!(
            "{},{:.12},{:.12},{:.12},{:.12},{:.3},{:.3},{:.3},{:.6},{:.6}\n",
            row.case_id,
            row.pearson_r,
            row.mae,
            row.rmse,
            row.max_abs,
            row.rust_kernel_ns,
            row.rust_oneshot_ns,
            row.python_ns,
            row.speedup_vs_oneshot,
            row.speedup_vs_python,
        ));
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}
