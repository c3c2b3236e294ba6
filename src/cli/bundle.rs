//! Bundle command implementation.

use crate::bundling::{Bundling, BundlingStrategy, ToolProbe};
use crate::cli::{Args, RuntimeConfig};
use crate::docker::DockerRuntime;
use crate::error::{Context, Result};

/// Resolve the plan and either print it or run it.
pub fn execute_bundle(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let props = args.to_props()?;
    let bundling = Bundling::new(props, ToolProbe::cargo_lambda())?;

    if args.plan_only {
        let plan = bundling.plan(&args.out_dir)?;
        let json = serde_json::to_string_pretty(&plan)?;
        config.output().data(&json)?;
        return Ok(0);
    }

    config.progress_println(&format!(
        "Bundling {} for {} ({})",
        args.entry.display(),
        bundling.props().target,
        match bundling.strategy() {
            BundlingStrategy::RunOnHost => "cargo lambda on host",
            BundlingStrategy::RunInContainer => "container build",
        }
    ));

    let outcome = bundling
        .bundle(&args.out_dir, &DockerRuntime::new())
        .with_context(|| format!("bundling {}", args.entry.display()))?;

    config.success_println(&format!("Bundle written to {}", outcome.output_dir.display()));
    config.indent(&format!("strategy: {:?}", outcome.strategy));
    config.indent(&format!("asset hash: {}", outcome.asset_hash));
    Ok(0)
}
