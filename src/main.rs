use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dicom_stack::{
    ArtifactRegistry, FormatConverter, Interpolation, LoadOptions, LoadWorker, PatientInfo,
    Session, SparsePointSampler, plane::reconcile,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder holding the slices of one series
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// Convert to NIfTI, named after the series folder
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Write the three middle planes as PNG
    #[arg(long, value_name = "DIR")]
    planes: Option<PathBuf>,

    /// Sample a point cloud of at most N voxels
    #[arg(long, value_name = "N")]
    points: Option<usize>,

    /// Only voxels brighter than this are sampled
    #[arg(long, default_value_t = 0)]
    threshold: i32,

    /// Note stored with the conversion record
    #[arg(long)]
    annotation: Option<String>,

    /// Extension of slice files
    #[arg(long, default_value = "dcm")]
    extension: String,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let options = LoadOptions::default().with_extension(cli.extension);

    let worker = LoadWorker::new().context("could not start load worker")?;
    let handle = worker.submit(&cli.dir, options.clone());
    let mut session = Session::new();
    session
        .apply(handle.blocking_wait())
        .with_context(|| format!("could not load {}", cli.dir.display()))?;

    if let Some(report) = session.report() {
        info!(
            found = report.files_found,
            skipped = report.files_skipped,
            unusable = report.files_unusable,
            used = report.slices_used,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "load finished"
        );
    }

    if let Some(planes_dir) = &cli.planes {
        fs::create_dir_all(planes_dir)?;
        let views = session.orthogonal_views()?;
        for image in reconcile(&views, None, Interpolation::Area) {
            let path = planes_dir.join(format!(
                "{}_{}.png",
                image.orientation().label().to_lowercase(),
                image.index()
            ));
            image
                .to_image()
                .context("plane does not fit an image buffer")?
                .save(&path)
                .with_context(|| format!("could not write {}", path.display()))?;
            info!(path = %path.display(), "wrote plane");
        }
    }

    if let Some(budget) = cli.points {
        let sampler = SparsePointSampler::new(cli.threshold, budget);
        let cloud = session.point_cloud(&sampler)?;
        info!(
            points = cloud.len(),
            candidates = cloud.candidates,
            downsampled = cloud.is_downsampled(),
            "sampled point cloud"
        );
    }

    if let Some(output_dir) = &cli.output_dir {
        let volume = session.volume().context("no volume loaded")?;
        let output_path = FormatConverter::default_output_path(&cli.dir, output_dir)?;
        if let Some(patient) = PatientInfo::from_directory(&cli.dir, &options)? {
            info!(
                id = %patient.patient_id,
                name = %patient.name,
                study_date = %patient.study_date,
                "patient"
            );
        }

        let mut registry = ArtifactRegistry::new();
        let record = FormatConverter::convert(
            volume,
            &cli.dir,
            &output_path,
            cli.annotation,
            Some(&mut registry),
        )?;
        println!("{}", record.output_path);
    }

    Ok(())
}
