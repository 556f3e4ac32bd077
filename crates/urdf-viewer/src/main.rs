//! URDF viewer entry point

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::path::PathBuf;

    use clap::Parser;

    use urdf_core::{PackageError, Payload, PayloadError, ReferenceStyle, ViewerOptions};
    use urdf_viewer::config::ConfigManager;

    /// View a URDF robot with its meshes
    #[derive(Debug, Parser)]
    #[command(name = "urdf-viewer", version)]
    pub struct Args {
        /// JSON payload to open
        #[arg(long, conflicts_with = "package")]
        pub payload: Option<PathBuf>,

        /// ROS package directory holding `urdf/` and `meshes/`
        #[arg(long)]
        pub package: Option<PathBuf>,

        /// Write the package as a JSON payload and exit
        #[arg(long, value_name = "OUT", requires = "package")]
        pub export_payload: Option<PathBuf>,

        /// Reference meshes through inline data URLs
        #[arg(long)]
        pub data_urls: bool,
    }

    #[derive(Debug, thiserror::Error)]
    pub enum CliError {
        #[error("Failed to read {path}: {source}")]
        Read {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("Failed to write {path}: {source}")]
        Write {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error(transparent)]
        Payload(#[from] PayloadError),
        #[error(transparent)]
        Package(#[from] PackageError),
        #[error(transparent)]
        Gui(#[from] eframe::Error),
    }

    impl Args {
        pub fn reference_style(&self) -> Option<ReferenceStyle> {
            self.data_urls.then_some(ReferenceStyle::DataUrl)
        }

        /// The payload named on the command line, if any
        pub fn initial_payload(&self) -> Result<Option<Payload>, CliError> {
            if let Some(path) = &self.payload {
                let json = std::fs::read_to_string(path).map_err(|source| CliError::Read {
                    path: path.clone(),
                    source,
                })?;
                return Ok(Some(Payload::from_json(&json)?));
            }
            if let Some(dir) = &self.package {
                return Ok(Some(Payload::from_package_dir(dir, configured_options())?));
            }
            Ok(None)
        }
    }

    fn configured_options() -> ViewerOptions {
        ConfigManager::new().config().viewer.clone()
    }

    /// `--export-payload`: package directory to JSON without opening a window
    pub fn export(dir: &std::path::Path, out: &std::path::Path) -> Result<(), CliError> {
        let payload = Payload::from_package_dir(dir, configured_options())?;
        let json = payload.to_json()?;
        std::fs::write(out, json).map_err(|source| CliError::Write {
            path: out.to_path_buf(),
            source,
        })?;
        tracing::info!("Wrote {} meshes to {:?}", payload.meshes.len(), out);
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), cli::CliError> {
    use clap::Parser;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "urdf_viewer=debug,urdf_core=info,urdf_renderer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = cli::Args::parse();

    if let (Some(dir), Some(out)) = (&args.package, &args.export_payload) {
        return cli::export(dir, out);
    }

    let initial = args.initial_payload()?;
    let reference_style = args.reference_style();

    tracing::info!("Starting URDF viewer");

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("URDF Viewer"),
        wgpu_options: urdf_viewer::wgpu_options(),
        ..Default::default()
    };

    eframe::run_native(
        "urdf-viewer",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(urdf_viewer::UrdfViewerApp::new(
                cc,
                initial,
                reference_style,
            )))
        }),
    )?;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {}
