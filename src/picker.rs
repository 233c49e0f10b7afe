//! Native folder selection for the download path

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error};

const DIALOG_TITLE: &str = "Select Download Folder";

#[async_trait]
pub trait FolderPicker: Send + Sync {
    /// Ask the user for a folder; `None` when dismissed or no dialog is available
    async fn pick_folder(&self) -> Option<PathBuf>;
}

/// Picker that shells out to `zenity`, then `kdialog`
#[derive(Debug, Clone)]
pub struct DialogPicker {
    start_dir: Option<PathBuf>,
}

impl DialogPicker {
    pub fn new(start_dir: Option<PathBuf>) -> Self {
        Self { start_dir }
    }

    fn candidates(&self) -> Vec<(&'static str, Vec<String>)> {
        let start = self
            .start_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string());

        let mut zenity = vec![
            "--file-selection".to_string(),
            "--directory".to_string(),
            format!("--title={}", DIALOG_TITLE),
        ];
        if let Some(dir) = &start {
            zenity.push(format!("--filename={}/", dir.trim_end_matches('/')));
        }

        let kdialog = vec![
            "--getexistingdirectory".to_string(),
            start.unwrap_or_else(|| ".".to_string()),
            "--title".to_string(),
            DIALOG_TITLE.to_string(),
        ];

        vec![("zenity", zenity), ("kdialog", kdialog)]
    }
}

#[async_trait]
impl FolderPicker for DialogPicker {
    async fn pick_folder(&self) -> Option<PathBuf> {
        for (program, args) in self.candidates() {
            let output = Command::new(program)
                .args(&args)
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .await;

            match output {
                Ok(output) if output.status.success() => {
                    return selected_path(&output.stdout);
                }
                Ok(output) => {
                    // Non-zero exit means the dialog was dismissed
                    debug!(program, status = %output.status, "Folder dialog closed without a selection");
                    return None;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(program, "Folder dialog not installed");
                }
                Err(e) => {
                    error!(program, error = %e, "Error selecting folder");
                    return None;
                }
            }
        }
        None
    }
}

/// Picker for headless runs; never selects anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPicker;

#[async_trait]
impl FolderPicker for NoPicker {
    async fn pick_folder(&self) -> Option<PathBuf> {
        None
    }
}

fn selected_path(stdout: &[u8]) -> Option<PathBuf> {
    let text = String::from_utf8_lossy(stdout);
    let path = text.trim();
    (!path.is_empty()).then(|| PathBuf::from(path))
}
