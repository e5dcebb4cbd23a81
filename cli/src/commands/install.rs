use domainlang_package::installer::InstallOptions;
use domainlang_package::progress;
use domainlang_package::Workspace;

use crate::error::CliResult;
use crate::GlobalOptions;

pub async fn run(global: &GlobalOptions) -> CliResult<()> {
    let mut workspace = Workspace::open(super::current_workspace_dir()?)?;
    let opts = InstallOptions {
        frozen_lock: global.frozen_lock,
        ..Default::default()
    };

    let (tx, rx) = progress::channel();
    let printer = tokio::spawn(super::drain_progress(rx, global.json));
    workspace.install(&opts, tx).await?;
    let _ = printer.await;

    println!(
        "installed {} dependencies",
        workspace.manifest.dependencies.len()
    );
    Ok(())
}
