//! agrozone CLI - management-zone delineation from spectral imagery

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use agrozone_core::io::{read_geotiff, read_geotiff_stack, write_geotiff};
use agrozone_core::{Raster, CRS};
use agrozone_zoning::indices::build_index_stack;
use agrozone_zoning::{output, pipeline, BandSet, IndexStack, ZoningConfig, ZoningParams};
use geo_types::{Coord, LineString, Polygon};

mod render;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "agrozone")]
#[command(author, version, about = "Management-zone delineation for precision agriculture", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delineate zones and sampling points from spectral bands
    Run(RunArgs),
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Multi-band GeoTIFF holding all bands in --band-order
    #[arg(long, conflicts_with_all = ["blue", "green", "red", "nir", "red_edge", "swir"])]
    stack: Option<PathBuf>,

    /// Band order of --stack, comma separated
    #[arg(long, default_value = "blue,green,red,nir,rededge,swir")]
    band_order: String,

    /// Blue band GeoTIFF
    #[arg(long)]
    blue: Option<PathBuf>,
    /// Green band GeoTIFF
    #[arg(long)]
    green: Option<PathBuf>,
    /// Red band GeoTIFF
    #[arg(long)]
    red: Option<PathBuf>,
    /// Near-infrared band GeoTIFF
    #[arg(long)]
    nir: Option<PathBuf>,
    /// Red-edge band GeoTIFF
    #[arg(long)]
    red_edge: Option<PathBuf>,
    /// Short-wave infrared band GeoTIFF
    #[arg(long)]
    swir: Option<PathBuf>,

    /// GeoJSON polygon delimiting the field; defaults to the raster extent
    #[arg(short, long)]
    boundary: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Force this cluster count instead of selecting one automatically
    #[arg(short, long)]
    k: Option<usize>,

    /// Minimum zone area in hectares
    #[arg(long)]
    min_zone_area: Option<f64>,

    /// Minimum sampling points per zone
    #[arg(long)]
    points_per_zone: Option<usize>,

    /// Upper bound for automatic cluster-count selection
    #[arg(long)]
    max_zones: Option<usize>,

    /// Seed for clustering and sampling
    #[arg(long)]
    seed: Option<u64>,

    /// EPSG code to assume when the imagery does not declare one
    #[arg(long, default_value = "32719")]
    epsg: u32,

    /// Base directory for run outputs
    #[arg(short, long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Render a categorical overview PNG of the zones
    #[arg(long)]
    overview: bool,

    /// Write the computed index grids as GeoTIFFs into the run directory
    #[arg(long)]
    save_indices: bool,
}

// ─── Run command ────────────────────────────────────────────────────────

fn run_zoning(args: RunArgs) -> Result<PathBuf> {
    let config = match &args.config {
        Some(path) => ZoningConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ZoningConfig::default(),
    };

    let mut params = ZoningParams::from_config(&config);
    params.cluster_override = args.k;
    if let Some(v) = args.min_zone_area {
        params.min_zone_area_ha = v;
    }
    if let Some(v) = args.points_per_zone {
        params.points_per_zone = v;
    }
    if let Some(v) = args.max_zones {
        params.max_zones = v;
    }
    if let Some(v) = args.seed {
        params.seed = v;
    }

    let bands = load_bands(&args)?;

    let pb = spinner("Building spectral indices...");
    let stack = build_index_stack(&bands, config.quality_threshold)?;
    pb.finish_and_clear();
    info!(
        "Indices: {}",
        stack.names().collect::<Vec<_>>().join(", ")
    );

    let transform = *stack
        .transform()
        .context("No index layers were produced from the input bands")?;
    let boundary = match &args.boundary {
        Some(path) => read_boundary(path)?,
        None => {
            let (rows, cols) = stack
                .shape()
                .context("No index layers were produced from the input bands")?;
            extent_polygon(&transform, rows, cols)
        }
    };

    let run_dir = args
        .output_dir
        .join(run_dir_name(params.cluster_override, params.min_zone_area_ha));
    info!("Output directory: {}", run_dir.display());

    let crs = stack
        .crs()
        .cloned()
        .unwrap_or_else(|| CRS::from_epsg(args.epsg));
    let pb = spinner("Delineating zones...");
    let result = pipeline::run(&stack, &boundary, &crs, &params)?;
    pb.finish_and_clear();

    output::write_results(&result, &run_dir).context("Failed to write result bundle")?;

    if args.overview {
        let path = run_dir.join("overview.png");
        render::write_overview(&result, &transform, &path)
            .context("Failed to render overview image")?;
        println!("Overview image: {}", path.display());
    }

    if args.save_indices {
        save_index_grids(&stack, &run_dir)?;
    }

    println!("Zones: {}", result.zones.len());
    println!("Sample points: {}", result.samples.len());
    println!("Silhouette score: {:.3}", result.metrics.silhouette);

    Ok(run_dir)
}

fn load_bands(args: &RunArgs) -> Result<BandSet> {
    if let Some(path) = &args.stack {
        return load_band_stack(path, &args.band_order);
    }

    if args.blue.is_none()
        && args.green.is_none()
        && args.red.is_none()
        && args.nir.is_none()
        && args.red_edge.is_none()
        && args.swir.is_none()
    {
        anyhow::bail!("No input imagery: pass --stack or at least one per-band file");
    }

    let mut bands = BandSet::default();
    if let Some(path) = &args.blue {
        bands.blue = Some(read_band(path)?);
    }
    if let Some(path) = &args.green {
        bands.green = Some(read_band(path)?);
    }
    if let Some(path) = &args.red {
        bands.red = Some(read_band(path)?);
    }
    if let Some(path) = &args.nir {
        bands.nir = Some(read_band(path)?);
    }
    if let Some(path) = &args.red_edge {
        bands.red_edge = Some(read_band(path)?);
    }
    if let Some(path) = &args.swir {
        bands.swir = Some(read_band(path)?);
    }
    Ok(bands)
}

fn load_band_stack(path: &Path, order: &str) -> Result<BandSet> {
    let pb = spinner("Reading band stack...");
    let rasters: Vec<Raster<f64>> = read_geotiff_stack(path)
        .with_context(|| format!("Failed to read band stack {}", path.display()))?;
    pb.finish_and_clear();

    let names: Vec<String> = order
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if names.len() != rasters.len() {
        anyhow::bail!(
            "--band-order names {} bands but {} holds {}",
            names.len(),
            path.display(),
            rasters.len()
        );
    }
    info!(
        "Stack: {} bands of {} x {}",
        rasters.len(),
        rasters[0].cols(),
        rasters[0].rows()
    );

    let mut bands = BandSet::default();
    for (name, raster) in names.iter().zip(rasters) {
        match name.as_str() {
            "blue" => bands.blue = Some(raster),
            "green" => bands.green = Some(raster),
            "red" => bands.red = Some(raster),
            "nir" => bands.nir = Some(raster),
            "rededge" | "red_edge" | "red-edge" => bands.red_edge = Some(raster),
            "swir" => bands.swir = Some(raster),
            "skip" | "-" => {}
            _ => anyhow::bail!(
                "Unknown band name: {}. Use blue, green, red, nir, rededge, swir, or skip.",
                name
            ),
        }
    }
    Ok(bands)
}

fn save_index_grids(stack: &IndexStack, run_dir: &Path) -> Result<()> {
    let pb = spinner("Writing index grids...");
    for (name, layer) in stack.iter() {
        let path = run_dir.join(format!("{}.tif", name));
        write_geotiff(layer, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    pb.finish_and_clear();
    info!("Index grids saved to {}", run_dir.display());
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_band(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> =
        read_geotiff(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    info!(
        "Input: {} x {} ({})",
        raster.cols(),
        raster.rows(),
        path.display()
    );
    Ok(raster)
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// Run directory name in the `{timestamp}_{k}_mz{area}` scheme
fn run_dir_name(k: Option<usize>, min_zone_area_ha: f64) -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let k_part = match k {
        Some(k) => format!("k{}", k),
        None => "k_auto".to_string(),
    };
    format!("{}_{}_mz{}", stamp, k_part, min_zone_area_ha)
}

/// Rectangle covering the full grid extent
fn extent_polygon(transform: &agrozone_core::GeoTransform, rows: usize, cols: usize) -> Polygon<f64> {
    let (min_x, min_y, max_x, max_y) = transform.bounds(cols, rows);
    Polygon::new(
        LineString::from(vec![
            Coord { x: min_x, y: min_y },
            Coord { x: max_x, y: min_y },
            Coord { x: max_x, y: max_y },
            Coord { x: min_x, y: max_y },
            Coord { x: min_x, y: min_y },
        ]),
        vec![],
    )
}

/// Read a field boundary from a GeoJSON file.
///
/// Accepts a bare Polygon geometry, a Feature wrapping one, or a
/// FeatureCollection whose first feature wraps one.
fn read_boundary(path: &Path) -> Result<Polygon<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read boundary file {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).context("Boundary file is not valid JSON")?;

    let geometry = match value.get("type").and_then(|t| t.as_str()) {
        Some("Polygon") => &value,
        Some("Feature") => value.get("geometry").context("Feature has no geometry")?,
        Some("FeatureCollection") => value
            .get("features")
            .and_then(|f| f.as_array())
            .and_then(|f| f.first())
            .and_then(|f| f.get("geometry"))
            .context("FeatureCollection has no features")?,
        _ => anyhow::bail!("Boundary must be a GeoJSON Polygon, Feature, or FeatureCollection"),
    };
    polygon_from_geojson(geometry)
}

fn polygon_from_geojson(geometry: &serde_json::Value) -> Result<Polygon<f64>> {
    let kind = geometry.get("type").and_then(|t| t.as_str());
    if kind != Some("Polygon") {
        anyhow::bail!(
            "Boundary geometry must be a Polygon, got {}",
            kind.unwrap_or("nothing")
        );
    }

    let rings = geometry
        .get("coordinates")
        .and_then(|c| c.as_array())
        .context("Polygon has no coordinates")?;

    let mut parsed: Vec<LineString<f64>> = Vec::with_capacity(rings.len());
    for ring in rings {
        let points = ring.as_array().context("Polygon ring is not an array")?;
        let mut coords = Vec::with_capacity(points.len());
        for point in points {
            let pair = point.as_array().context("Ring coordinate is not an array")?;
            let x = pair
                .first()
                .and_then(|v| v.as_f64())
                .context("Coordinate x is not a number")?;
            let y = pair
                .get(1)
                .and_then(|v| v.as_f64())
                .context("Coordinate y is not a number")?;
            coords.push(Coord { x, y });
        }
        parsed.push(LineString::from(coords));
    }

    let mut rings = parsed.into_iter();
    let exterior = rings.next().context("Polygon has no exterior ring")?;
    Ok(Polygon::new(exterior, rings.collect()))
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Run(args) => {
            let start = Instant::now();
            let run_dir = run_zoning(args)?;
            done("Zoning results", &run_dir, start.elapsed());
        }

        Commands::Info { input } => {
            let pb = spinner("Reading raster...");
            let bands: Vec<Raster<f64>> =
                read_geotiff_stack(&input).context("Failed to read raster")?;
            pb.finish_and_clear();

            let first = bands.first().context("File contains no bands")?;
            let (rows, cols) = first.shape();
            let bounds = first.bounds();

            println!("File: {}", input.display());
            println!("Bands: {}", bands.len());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, first.len());
            println!("Cell size: {}", first.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = first.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = first.nodata() {
                println!("NoData: {}", nodata);
            }

            for (i, band) in bands.iter().enumerate() {
                let stats = band.statistics();
                println!("\nBand {}:", i + 1);
                if let Some(min) = stats.min {
                    println!("  Min: {:.4}", min);
                }
                if let Some(max) = stats.max {
                    println!("  Max: {:.4}", max);
                }
                if let Some(mean) = stats.mean {
                    println!("  Mean: {:.4}", mean);
                }
                println!(
                    "  Valid cells: {} ({:.1}%)",
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / band.len() as f64
                );
            }
        }
    }

    Ok(())
}
