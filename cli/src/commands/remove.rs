use domainlang_package::Workspace;

use crate::error::CliResult;
use crate::GlobalOptions;

pub async fn run(_global: &GlobalOptions, alias: &str) -> CliResult<()> {
    let mut workspace = Workspace::open(super::current_workspace_dir()?)?;
    workspace.remove(alias).await?;
    println!("removed {alias}");
    Ok(())
}
