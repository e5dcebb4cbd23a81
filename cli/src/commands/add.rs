use domainlang_package::installer::InstallOptions;
use domainlang_package::progress;
use domainlang_package::spec::Specifier;
use domainlang_package::Workspace;

use crate::error::CliResult;
use crate::GlobalOptions;

pub async fn run(global: &GlobalOptions, specifier: &str) -> CliResult<()> {
    let specifier = Specifier::parse(specifier)?;
    let mut workspace = Workspace::open(super::current_workspace_dir()?)?;
    let opts = InstallOptions {
        frozen_lock: global.frozen_lock,
        ..Default::default()
    };

    let (tx, rx) = progress::channel();
    let printer = tokio::spawn(super::drain_progress(rx, global.json));
    workspace.add(&specifier, &opts, tx).await?;
    let _ = printer.await;

    println!("added {specifier}");
    Ok(())
}
