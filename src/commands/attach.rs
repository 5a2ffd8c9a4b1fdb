use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::StoreClient;
use crate::commands::utils::{load_config, parse_resource_arg, ConfigOverrides};
use crate::registry::RegistryResolver;
use crate::resource::ResourceUploader;
use crate::types::ArtifactId;
use crate::ui::{self, ConsoleReporter, Reporter};

pub struct AttachArgs {
    pub artifact_id: String,
    pub resource: String,
    pub upload_cache: Option<PathBuf>,
    pub no_resume: bool,
    pub auth: Option<String>,
    pub quiet: bool,
    pub verbose: bool,
}

pub async fn execute(args: AttachArgs) -> Result<()> {
    let artifact_id: ArtifactId = args.artifact_id.parse()?;
    let resource = parse_resource_arg(&args.resource)?;
    let config = load_config(ConfigOverrides {
        auth: args.auth,
        upload_cache: args.upload_cache,
        no_resume: args.no_resume,
    })?;

    let cache_path = config.upload_cache_path()?;
    if args.verbose {
        ui::info(&format!("Store: {}", config.api_url));
        match &cache_path {
            Some(path) => ui::info(&format!("Upload cache: {}", path.display())),
            None => ui::info("Upload cache: disabled"),
        }
    }

    let store = StoreClient::from_config(&config)?;
    let resolver = RegistryResolver::new()?;
    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new(args.quiet));

    let uploader = ResourceUploader {
        store: &store,
        resolver: &resolver,
        reporter,
        cache_path,
        working_dir: std::env::current_dir()?,
    };

    let revision = uploader
        .upload(&artifact_id, &resource.name, &resource.value)
        .await?;

    ui::info(&format!("uploaded revision {revision} of {}", resource.name));
    Ok(())
}
