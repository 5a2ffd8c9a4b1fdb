use anyhow::Result;

use crate::api::{ResourceMeta, StoreClient};
use crate::cli::OutputFormat;
use crate::commands::utils::{load_config, ConfigOverrides};
use crate::store::ResourceStore;
use crate::types::ArtifactId;
use crate::ui;

pub async fn execute(
    artifact_id: String,
    format: OutputFormat,
    auth: Option<String>,
    verbose: bool,
) -> Result<()> {
    let artifact_id: ArtifactId = artifact_id.parse()?;
    let config = load_config(ConfigOverrides {
        auth,
        ..ConfigOverrides::default()
    })?;
    let store = StoreClient::from_config(&config)?;

    if verbose {
        ui::info(&format!("Listing resources for: {artifact_id}"));
    }

    let mut resources = store.list_resources(&artifact_id).await?;
    resources.sort_by(|a, b| a.name.cmp(&b.name));

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resources)?),
        OutputFormat::Tabular => print!("{}", render_table(&resources)),
    }
    Ok(())
}

fn render_table(resources: &[ResourceMeta]) -> String {
    if resources.is_empty() {
        return "No resources found\n".to_string();
    }

    let name_width = resources
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        .max("RESOURCE".len());
    let kind_width = resources
        .iter()
        .map(|r| r.kind.len())
        .max()
        .unwrap_or(0)
        .max("TYPE".len());

    let mut output = format!(
        "{:<name_width$}  {:<kind_width$}  {}\n",
        "RESOURCE", "TYPE", "REVISION"
    );
    for resource in resources {
        let revision = resource
            .revision
            .map(|revision| revision.to_string())
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "{:<name_width$}  {:<kind_width$}  {}\n",
            resource.name, resource.kind, revision
        ));
    }
    output
}
