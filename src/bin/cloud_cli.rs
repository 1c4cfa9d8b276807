// src/bin/cloud_cli.rs
use clap::{Parser, Subcommand, ValueEnum};
use gr_cloud::{Cloud, CloudSettings, SpreadShape};
use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, ValueEnum)]
enum Shape {
    Sqrt,
    Linear,
}
impl From<Shape> for SpreadShape {
    fn from(s: Shape) -> Self {
        match s {
            Shape::Sqrt => SpreadShape::Sqrt,
            Shape::Linear => SpreadShape::Linear,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Observations, one per line: mass first, then coordinates. Reads stdin when omitted.
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// JSON settings file (max_points, shape, overhang); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of stored points
    #[arg(short = 'm', long)]
    max_points: Option<usize>,

    /// Spread shape used by range queries (sqrt|linear)
    #[arg(short = 's', long, value_enum)]
    shape: Option<Shape>,

    /// Extrapolation past the outermost sample, as a fraction of the inner gap
    #[arg(long)]
    overhang: Option<f64>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print every stored point
    Points,
    /// Print mass and centroid inside a box; repeat --range per axis or sub-interval
    Range {
        /// DIM:LO:HI, e.g. 1:0:10 (dimension 0 is mass)
        #[arg(short, long = "range", required = true)]
        ranges: Vec<String>,
    },
    /// Print the interpolated point at the given coordinates
    Sample {
        /// Coordinates, comma separated
        #[arg(long, allow_hyphen_values = true)]
        at: String,
    },
    /// Print point count, inserted mass and displacement
    Stats,
}

fn parse_numbers(s: &str) -> Result<Vec<f64>, Box<dyn Error>> {
    let mut out = Vec::new();
    for tok in s
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.is_empty())
    {
        out.push(tok.parse::<f64>()?);
    }
    Ok(out)
}

fn parse_observations(text: &str) -> Result<Vec<Vec<f64>>, Box<dyn Error>> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = parse_numbers(line)?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(format!(
                    "line {}: {} values, expected {}",
                    n + 1,
                    row.len(),
                    first.len()
                )
                .into());
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_range(s: &str) -> Result<(usize, f64, f64), Box<dyn Error>> {
    let mut parts = s.splitn(3, ':');
    let (Some(d), Some(lo), Some(hi)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("range '{s}' is not DIM:LO:HI").into());
    };
    Ok((d.parse()?, lo.parse()?, hi.parse()?))
}

fn read_input(path: Option<&PathBuf>) -> Result<String, Box<dyn Error>> {
    match path {
        Some(p) => Ok(fs::read_to_string(p)?),
        None => {
            let mut s = String::new();
            io::stdin().read_to_string(&mut s)?;
            Ok(s)
        }
    }
}

fn join(v: &[f64]) -> String {
    v.iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join("\t")
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut settings = match &args.config {
        Some(p) => serde_json::from_str::<CloudSettings>(&fs::read_to_string(p)?)?,
        None => CloudSettings::default(),
    };
    if let Some(n) = args.max_points {
        settings.max_points = n;
    }
    if let Some(s) = args.shape.clone() {
        settings.shape = s.into();
    }
    if let Some(f) = args.overhang {
        settings.overhang = f;
    }

    let rows = parse_observations(&read_input(args.input.as_ref())?)?;
    let width = rows.first().map_or(1, Vec::len);
    if width == 0 {
        return Err("observations need at least a mass".into());
    }

    let mut cloud = Cloud::builder()
        .settings(settings)
        .dimensions(width - 1)
        .build()?;
    for row in &rows {
        cloud.insert(row)?;
    }
    debug!(
        observations = rows.len(),
        kept = cloud.len(),
        "cloud built"
    );

    match args.cmd {
        Cmd::Points => {
            for p in cloud.points() {
                println!("{}", join(p));
            }
        }
        Cmd::Range { ranges } => {
            let mut intervals = vec![Vec::new(); cloud.dimension_count()];
            for r in &ranges {
                let (d, lo, hi) = parse_range(r)?;
                let slot = intervals
                    .get_mut(d)
                    .ok_or_else(|| format!("dimension {d} does not exist"))?;
                slot.push((lo, hi));
            }
            let sel = cloud.range_query(&intervals)?;
            let mass = sel.mass();
            let centroid = sel.centroid(mass, cloud.dimension_count());
            println!("mass\t{mass}");
            println!("centroid\t{}", join(&centroid[1..]));
        }
        Cmd::Sample { at } => {
            let mut query = vec![0.0];
            query.extend(parse_numbers(&at)?);
            let p = cloud.sample(&query)?;
            println!("{}", join(&p));
        }
        Cmd::Stats => {
            println!("points\t{}", cloud.len());
            println!("total_volume\t{}", cloud.total_volume());
            println!("displacement\t{}", cloud.displacement());
        }
    }
    Ok(())
}
