use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::Float64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Retention time axis: 0 – 20 min, step 0.01.
const N_POINTS: usize = 2001;
const TIME_STEP: f64 = 0.01;

/// (retention time, width, height) of the four default peaks.
const BASE_PEAKS: [(f64, f64, f64); 4] = [
    (10.5, 0.08, 120.0),
    (11.5, 0.10, 80.0),
    (12.5, 0.07, 150.0),
    (13.5, 0.12, 60.0),
];

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Gaussian peaks on a linear drift, plus white noise.
fn generate_chromatogram(
    time: &[f64],
    peaks: &[(f64, f64, f64)],
    drift: (f64, f64),
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    time.iter()
        .map(|&t| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(t, mu, sigma, amp))
                .sum();
            signal + drift.0 + drift.1 * t + rng.gauss(0.0, noise_level)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_delimited(
    path: &Path,
    delimiter: u8,
    header: [&str; 2],
    time: &[f64],
    signal: &[f64],
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header)?;
    for (t, y) in time.iter().zip(signal) {
        writer.write_record([format!("{t:.2}"), format!("{y:.4}")])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, time: &[f64], signal: &[f64]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("time", DataType::Float64, false),
        Field::new("signal", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(time.to_vec())),
            Arc::new(Float64Array::from(signal.to_vec())),
        ],
    )?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let time: Vec<f64> = (0..N_POINTS).map(|i| i as f64 * TIME_STEP).collect();

    // (file, delimiter, header, concentration scale, drift)
    let delimited: [(&str, u8, [&str; 2], f64, (f64, f64)); 4] = [
        ("run_01.csv", b',', ["Time", "Signal"], 1.0, (2.0, 0.05)),
        ("run_02.csv", b';', ["Retention Time (min)", "Absorbance (mAU)"], 0.5, (1.0, 0.10)),
        ("run_03.txt", b'\t', ["RT", "Intensity"], 2.0, (3.0, -0.05)),
        ("run_04.txt", b' ', ["Minutes", "Response"], 1.5, (0.5, 0.0)),
    ];

    for (name, delimiter, header, scale, drift) in delimited {
        let peaks: Vec<_> = BASE_PEAKS
            .iter()
            .map(|&(mu, sigma, amp)| (mu, sigma, amp * scale))
            .collect();
        let signal = generate_chromatogram(&time, &peaks, drift, 0.5, &mut rng);
        let path = out_dir.join(name);
        write_delimited(&path, delimiter, header, &time, &signal)?;
        log::info!("wrote {}", path.display());
    }

    let signal = generate_chromatogram(&time, &BASE_PEAKS, (1.5, 0.02), 0.3, &mut rng);
    let parquet_path = out_dir.join("run_05.parquet");
    write_parquet(&parquet_path, &time, &signal)?;

    // No numeric data: must fail on its own without stopping the batch.
    let malformed = out_dir.join("run_06_malformed.csv");
    std::fs::write(&malformed, "Time,Signal\nabc,def\nghi,jkl\n")
        .with_context(|| format!("creating {}", malformed.display()))?;

    println!(
        "Wrote 6 chromatograms ({} points each, one malformed) to {}",
        N_POINTS,
        out_dir.display()
    );
    Ok(())
}
