//! Station runtime operations: file import, runtime files, scanner and
//! hot start.

use fs42_proto::protocol::{ImportAction, ImportOutcome, ImportRequest, RuntimeFiles, ScannerLaunch};
use reqwest::Method;
use tracing::info;

use crate::error::{apply_policy, Result};
use crate::ChannelStore;

impl ChannelStore {
    /// Video files sitting in the backend's runtime directory.
    pub async fn list_runtime_files(&self) -> Result<Vec<String>> {
        let url = self.api().endpoint(&["runtime-files"])?;
        let fetch = self.api().get_json::<RuntimeFiles>(url);
        let res = self.cancellable(fetch).await.map(|r| r.files);
        apply_policy(self.listing_policy(), "fetch runtime files", res, Vec::new)
    }

    /// Copy or move files into a sub-directory of the channel's content
    /// dir. Reloads the directory afterwards since empty folders change.
    pub async fn import_files(
        &self,
        name: &str,
        files: Vec<String>,
        target: &str,
        action: ImportAction,
    ) -> Result<ImportOutcome> {
        info!(
            "import {} file(s) into {:?}/{} ({:?})",
            files.len(),
            name,
            target,
            action
        );
        let request = ImportRequest {
            files,
            target: target.to_string(),
            action,
        };
        let url = self.api().endpoint(&["channels", name, "import-files"])?;
        let write = self
            .api()
            .send_json::<_, ImportOutcome>(Method::POST, url, Some(&request));
        let (outcome, _) = self.write_then_reload("import files", write).await?;
        Ok(outcome.unwrap_or_default())
    }

    /// Start the catalog scanner. Returns the URL its UI is served on.
    pub async fn launch_scanner(&self) -> Result<Option<ScannerLaunch>> {
        info!("launch scanner");
        let url = self.api().endpoint(&["launch-scanner"])?;
        let call = self
            .api()
            .send_json::<(), ScannerLaunch>(Method::POST, url, None);
        let res = self.cancellable(call).await.map(Some);
        apply_policy(self.edits_policy(), "launch scanner", res, || None)
    }

    /// Restart playout with the current configuration.
    pub async fn hot_start(&self) -> Result<()> {
        info!("hot start");
        let url = self.api().endpoint(&["hot-start"])?;
        let call = self.api().send(Method::POST, url, None::<&()>);
        let res = self.cancellable(call).await;
        apply_policy(self.edits_policy(), "hot start", res, || ())
    }
}
