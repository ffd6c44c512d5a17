use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use clap::{ArgAction, Parser, Subcommand};
use nalgebra::Point2;
use serde::Serialize;

use touchbot::core::{level_from_verbosity, Quad, RasterSize};
use touchbot::mapping::{CalibrationPair, CalibrationRecord, CoordinateMapper};
use touchbot::motion::list_ports;
use touchbot::rectify::{HomographyEstimator, ManualQuadEstimator, Rectification, ReferenceGrid};
use touchbot::{Station, StationConfig};

/// Operator tools for a camera-guided touch robot.
#[derive(Debug, Parser)]
#[command(author, version, about = "Camera-to-robot touch station")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Rectification from a detected reference grid (JSON).
    Rectify {
        #[arg(long)]
        grid: PathBuf,
        /// Camera frame whose size bounds the output; also rendered with --out.
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long, required_unless_present = "image")]
        frame_width: Option<u32>,
        #[arg(long, required_unless_present = "image")]
        frame_height: Option<u32>,
        /// Keep only the pattern rectangle instead of the whole frame.
        #[arg(long)]
        crop: bool,
        /// Station config supplying the rectification limits.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Where to write the rectified image (needs --image).
        #[arg(long, requires = "image")]
        out: Option<PathBuf>,
        /// Where to write the rectification JSON; stdout otherwise.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Rectification from four clicked corners.
    Quad {
        /// tlx,tly,trx,try,blx,bly,brx,bry
        #[arg(long, value_parser = parse_quad, allow_hyphen_values = true)]
        points: Quad,
    },
    /// Fit the pixel-to-millimetre mapping from two reference points.
    Calibrate {
        /// image_x,image_y,robot_x,robot_y
        #[arg(long, value_parser = parse_pair, allow_hyphen_values = true)]
        p1: CalibrationPair,
        #[arg(long, value_parser = parse_pair, allow_hyphen_values = true)]
        p2: CalibrationPair,
        /// Height of the rectified raster the image points were picked in.
        #[arg(long)]
        raster_height: f64,
        /// Robot Z of the phone surface, at or below the home height.
        #[arg(long, allow_hyphen_values = true)]
        phone_z: f64,
        /// Rectification JSON to store alongside the mapping.
        #[arg(long)]
        rectification: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Map a rectified-image pixel to robot millimetres.
    Map {
        #[arg(long)]
        calibration: PathBuf,
        /// x,y
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        point: Point2<f64>,
    },
    /// List serial ports.
    Ports,
    /// Tap the phone at a rectified-image pixel.
    Touch {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        calibration: PathBuf,
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        point: Point2<f64>,
        /// Serial port, overriding the config.
        #[arg(long)]
        port: Option<String>,
    },
    /// Home the robot.
    Home {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        port: Option<String>,
    },
    /// Write the default station configuration.
    InitConfig {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct MapOutput {
    x: f64,
    y: f64,
}

fn parse_floats<const N: usize>(raw: &str) -> Result<[f64; N], String> {
    let values = raw
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("`{}`: {e}", v.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let got = values.len();
    <[f64; N]>::try_from(values)
        .map_err(|_| format!("expected {N} comma-separated numbers, got {got}"))
}

fn parse_point(raw: &str) -> Result<Point2<f64>, String> {
    let [x, y] = parse_floats::<2>(raw)?;
    Ok(Point2::new(x, y))
}

fn parse_pair(raw: &str) -> Result<CalibrationPair, String> {
    let [ix, iy, rx, ry] = parse_floats::<4>(raw)?;
    Ok(CalibrationPair::new(Point2::new(ix, iy), Point2::new(rx, ry)))
}

fn parse_quad(raw: &str) -> Result<Quad, String> {
    let [tlx, tly, trx, try_, blx, bly, brx, bry] = parse_floats::<8>(raw)?;
    Ok(Quad::new(
        Point2::new(tlx, tly),
        Point2::new(trx, try_),
        Point2::new(blx, bly),
        Point2::new(brx, bry),
    ))
}

fn load_config(path: Option<&Path>) -> Result<StationConfig, Box<dyn Error>> {
    match path {
        Some(p) => Ok(StationConfig::load_json(p)?),
        None => Ok(StationConfig::default()),
    }
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn init_logging(verbose: u8) {
    let level = level_from_verbosity(verbose);
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        touchbot::core::init_tracing(false);
        log::set_max_level(level);
    }
    #[cfg(not(feature = "tracing"))]
    if let Err(err) = touchbot::core::init_with_level(level) {
        eprintln!("logger: {err}");
    }
}

fn open_station(config: Option<&Path>, port: Option<String>) -> Result<Station, Box<dyn Error>> {
    let mut config = load_config(config)?;
    if port.is_some() {
        config.serial.port = port;
    }
    Ok(Station::new(config))
}

fn run_rectify(
    grid: &Path,
    image: Option<&Path>,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
    crop: bool,
    config: Option<&Path>,
    out: Option<&Path>,
) -> Result<Rectification, Box<dyn Error>> {
    let mut params = load_config(config)?.rectify;
    if crop {
        params.transform_full_image = false;
    }
    let grid: ReferenceGrid = load_json_file(grid)?;

    let frame_img = image.map(touchbot::imageio::load_gray).transpose()?;
    let frame = match (&frame_img, frame_width, frame_height) {
        (_, Some(w), Some(h)) => RasterSize::new(w, h),
        (Some(img), _, _) => touchbot::imageio::raster_size(img),
        _ => return Err("frame size unknown: pass --image or --frame-width/--frame-height".into()),
    };

    let rect = HomographyEstimator::new(params).estimate(&grid, frame)?;
    log::info!(
        "rectified size {}x{}",
        rect.size().width,
        rect.size().height
    );

    if let (Some(img), Some(out)) = (&frame_img, out) {
        touchbot::imageio::rectify_image(img, &rect)?.save(out)?;
    }
    Ok(rect)
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Cmd::Rectify {
            grid,
            image,
            frame_width,
            frame_height,
            crop,
            config,
            out,
            report,
        } => {
            let rect = run_rectify(
                &grid,
                image.as_deref(),
                frame_width,
                frame_height,
                crop,
                config.as_deref(),
                out.as_deref(),
            )?;
            let json = serde_json::to_string_pretty(&rect)?;
            match report {
                Some(path) => fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
        Cmd::Quad { points } => {
            let rect = ManualQuadEstimator::new().estimate(&points);
            if rect.is_degenerate() {
                log::warn!("corners are degenerate");
            }
            println!("{}", serde_json::to_string_pretty(&rect)?);
        }
        Cmd::Calibrate {
            p1,
            p2,
            raster_height,
            phone_z,
            rectification,
            out,
        } => {
            let mut mapper = CoordinateMapper::new();
            mapper.fit(p1, p2, raster_height)?;
            let calibration = mapper.calibration().ok_or("calibration missing after fit")?;
            let mut record = CalibrationRecord::new(calibration, phone_z);
            if let Some(path) = rectification {
                let rect: Rectification = load_json_file(&path)?;
                record = record.with_rectification(rect.homography(), rect.size());
            }
            record.write_json(&out)?;
            println!("{}", serde_json::to_string_pretty(&record.affine_map())?);
        }
        Cmd::Map { calibration, point } => {
            let record = CalibrationRecord::load_json(&calibration)?;
            let mapper = CoordinateMapper::from_record(&record)?;
            let robot = mapper.apply(point)?;
            let out = MapOutput {
                x: robot.x,
                y: robot.y,
            };
            println!("{}", serde_json::to_string(&out)?);
        }
        Cmd::Ports => {
            for port in list_ports()? {
                println!("{port}");
            }
        }
        Cmd::Touch {
            config,
            calibration,
            point,
            port,
        } => {
            let mut station = open_station(config.as_deref(), port)?;
            station.load_calibration(&calibration)?;
            let target = station.target(point)?;
            station.connect()?;
            let responses = station.touch(point)?;
            for response in &responses {
                log::debug!("{} -> {:?}", response.command, response.lines);
            }
            println!("touched ({:.3}, {:.3})", target.x, target.y);
        }
        Cmd::Home { config, port } => {
            let station = open_station(config.as_deref(), port)?;
            station.connect()?;
            station.session().home()?;
            let pose = station.session().pose();
            println!("homed at ({:.3}, {:.3}, {:.3})", pose.x, pose.y, pose.z);
        }
        Cmd::InitConfig { out } => {
            StationConfig::default().write_json(&out)?;
        }
    }
    Ok(())
}
