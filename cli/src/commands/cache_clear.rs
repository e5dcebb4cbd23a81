use domainlang_package::Workspace;

use crate::error::CliResult;
use crate::GlobalOptions;

pub async fn run(_global: &GlobalOptions) -> CliResult<()> {
    let workspace = Workspace::open(super::current_workspace_dir()?)?;
    workspace.cache_clear().await?;
    println!("cache cleared");
    Ok(())
}
