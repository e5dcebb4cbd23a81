use domainlang_package::progress;
use domainlang_package::Workspace;

use crate::error::CliResult;
use crate::GlobalOptions;

pub async fn run(global: &GlobalOptions, alias: Option<&str>) -> CliResult<()> {
    let mut workspace = Workspace::open(super::current_workspace_dir()?)?;

    let (tx, rx) = progress::channel();
    let printer = tokio::spawn(super::drain_progress(rx, global.json));
    let upgraded = workspace.upgrade(alias, tx).await?;
    let _ = printer.await;

    if upgraded.is_empty() {
        println!("nothing to upgrade");
    } else {
        for report in &upgraded {
            println!(
                "{} {} -> {} ({})",
                report.alias, report.current, report.latest, report.bump
            );
        }
    }
    Ok(())
}
