//! CLI mode for gdrive-dl: download or inspect a single Drive file.

mod progress;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::{Term, style};

use crate::download::{ConsoleProgress, DownloadProgress};
use crate::{
    DriveApi, Error, ErrorKind, FetcherConfig, FileFetcher, FileMetadata, FileSystem, Result,
    extract_file_id,
};

use progress::{BarProgress, print_summary};

#[derive(Debug, Parser)]
#[command(name = "gdrive-dl")]
#[command(about = "Download files from Google Drive")]
#[command(version)]
pub struct Cli {
    /// Path to the OAuth client-secret JSON.
    #[arg(long, global = true, value_name = "PATH")]
    pub credentials: Option<PathBuf>,

    /// Path to the token cache.
    #[arg(long, global = true, value_name = "PATH")]
    pub token_cache: Option<PathBuf>,

    /// Configuration file (default: the user config directory).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Bytes requested per media chunk.
    #[arg(long, global = true, value_name = "BYTES")]
    pub chunk_size: Option<u64>,

    /// Print plain progress lines instead of a progress bar.
    #[arg(long, global = true)]
    pub plain: bool,

    /// Print the consent URL without opening a browser.
    #[arg(long, global = true)]
    pub no_browser: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download a file.
    Download {
        /// File ID or Drive share URL.
        file: String,

        /// Output path (default: the remote file name in the current directory).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a file's metadata.
    Info {
        /// File ID or Drive share URL.
        file: String,
    },
}

/// Runs the parsed command line and maps the outcome to an exit code.
pub async fn run(cli: Cli) -> ExitCode {
    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            eprintln!("{} {e}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<bool> {
    let config = resolve_config(&cli)?;
    match &cli.command {
        Command::Download { file, output } => {
            let file_id = resolve_file_id(file)?;
            let fetcher = FileFetcher::connect(config)
                .await?
                .with_progress(make_progress(cli.plain));
            download(&fetcher, &file_id, output.as_deref()).await
        }
        Command::Info { file } => {
            let file_id = resolve_file_id(file)?;
            let fetcher = FileFetcher::connect(config).await?;
            let metadata = fetcher.get_file_metadata(&file_id).await?;
            println!("{}", fetcher.format_metadata(metadata.as_ref()));
            Ok(metadata.is_some())
        }
    }
}

async fn download<D: DriveApi, F: FileSystem>(
    fetcher: &FileFetcher<D, F>,
    file_id: &str,
    output: Option<&Path>,
) -> Result<bool> {
    let Some(metadata) = fetcher.get_file_metadata(file_id).await? else {
        return Ok(false);
    };
    let output = output.map_or_else(|| default_output_path(&metadata, file_id), Path::to_path_buf);

    match fetcher.fetch_file_with(file_id, metadata, &output).await {
        Ok(report) => {
            print_summary(&report);
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::InvalidArgument => Err(e),
        Err(e) => {
            println!("Error downloading file: {e}");
            Ok(false)
        }
    }
}

fn make_progress(plain: bool) -> Arc<dyn DownloadProgress> {
    if plain || !Term::stdout().is_term() {
        Arc::new(ConsoleProgress)
    } else {
        Arc::new(BarProgress::new())
    }
}

/// Loads the config file and applies command-line overrides.
fn resolve_config(cli: &Cli) -> Result<FetcherConfig> {
    let mut config = FetcherConfig::load(cli.config.as_deref())?;
    if let Some(path) = &cli.credentials {
        config = config.with_client_secrets_path(path);
    }
    if let Some(path) = &cli.token_cache {
        config = config.with_token_cache_path(path);
    }
    if let Some(chunk_size) = cli.chunk_size {
        if chunk_size == 0 {
            return Err(Error::InvalidArgument("--chunk-size must be positive".into()));
        }
        config = config.with_chunk_size(chunk_size);
    }
    if cli.no_browser {
        config = config.with_open_browser(false);
    }
    Ok(config)
}

fn resolve_file_id(input: &str) -> Result<String> {
    extract_file_id(input)
        .ok_or_else(|| Error::InvalidArgument(format!("not a Drive file ID or link: {input:?}")))
}

/// Remote file name reduced to its last component, or the file ID.
fn default_output_path(metadata: &FileMetadata, file_id: &str) -> PathBuf {
    metadata
        .name
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .map_or_else(|| PathBuf::from(file_id), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::tests::MockDrive;
    use std::sync::atomic::Ordering;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gdrive-dl").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parses_download_with_output() {
        let cli = parse(&["download", "abc", "-o", "out/file.bin", "--plain"]);
        assert!(cli.plain);
        match cli.command {
            Command::Download { file, output } => {
                assert_eq!(file, "abc");
                assert_eq!(output, Some(PathBuf::from("out/file.bin")));
            }
            Command::Info { .. } => panic!("expected download"),
        }
    }

    #[test]
    fn parses_info() {
        let cli = parse(&["--credentials", "c.json", "info", "abc"]);
        assert_eq!(cli.credentials, Some(PathBuf::from("c.json")));
        assert!(matches!(cli.command, Command::Info { ref file } if file == "abc"));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["gdrive-dl"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "chunk_size = 1024\ntoken_cache_path = \"cache.json\"\n")
            .unwrap();

        let cli = parse(&[
            "--config",
            config_path.to_str().unwrap(),
            "--chunk-size",
            "2048",
            "--no-browser",
            "info",
            "abc",
        ]);
        let config = resolve_config(&cli).unwrap();

        assert_eq!(config.chunk_size, 2048);
        assert_eq!(config.token_cache_path, PathBuf::from("cache.json"));
        assert!(!config.open_browser);
    }

    #[test]
    fn zero_chunk_size_is_invalid() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "").unwrap();

        let cli = parse(&[
            "--config",
            config_path.to_str().unwrap(),
            "--chunk-size",
            "0",
            "info",
            "abc",
        ]);
        let err = resolve_config(&cli).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn file_argument_accepts_links() {
        assert_eq!(
            resolve_file_id("https://drive.google.com/file/d/1AbC/view").unwrap(),
            "1AbC"
        );
        let err = resolve_file_id("not a link").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    fn fetcher_for(drive: MockDrive) -> FileFetcher<MockDrive> {
        FileFetcher::with_api(drive, FetcherConfig::default())
            .with_progress(Arc::new(crate::NoProgress))
    }

    #[tokio::test]
    async fn download_metadata_failure_stops_before_transfer() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.bin");
        let fetcher = fetcher_for(MockDrive::new(None, b"0123"));

        assert!(!download(&fetcher, "abc", Some(&output)).await.unwrap());

        assert_eq!(fetcher.api().metadata_calls.load(Ordering::SeqCst), 1);
        assert!(fetcher.api().requested_ranges().is_empty());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn download_with_output_fetches_metadata_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("nested/out.bin");
        let metadata = FileMetadata {
            id: "abc".to_string(),
            name: Some("remote.bin".to_string()),
            size: Some(4),
            ..FileMetadata::default()
        };
        let fetcher = fetcher_for(MockDrive::new(Some(metadata), b"0123"));

        assert!(download(&fetcher, "abc", Some(&output)).await.unwrap());

        assert_eq!(fetcher.api().metadata_calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&output).unwrap(), b"0123");
    }

    #[test]
    fn default_output_uses_remote_name() {
        let metadata = FileMetadata {
            name: Some("report.pdf".to_string()),
            ..FileMetadata::default()
        };
        assert_eq!(default_output_path(&metadata, "id"), PathBuf::from("report.pdf"));
    }

    #[test]
    fn default_output_strips_directories() {
        let metadata = FileMetadata {
            name: Some("../../etc/passwd".to_string()),
            ..FileMetadata::default()
        };
        assert_eq!(default_output_path(&metadata, "id"), PathBuf::from("passwd"));
    }

    #[test]
    fn default_output_falls_back_to_id() {
        assert_eq!(
            default_output_path(&FileMetadata::default(), "1AbC"),
            PathBuf::from("1AbC")
        );
        let dots = FileMetadata {
            name: Some("..".to_string()),
            ..FileMetadata::default()
        };
        assert_eq!(default_output_path(&dots, "1AbC"), PathBuf::from("1AbC"));
    }
}
