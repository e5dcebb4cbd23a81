use domainlang_package::Workspace;

use crate::error::CliResult;
use crate::GlobalOptions;

#[derive(serde::Serialize)]
struct OutdatedRow {
    alias: String,
    name: String,
    current: String,
    latest: String,
    bump: String,
}

pub async fn run(global: &GlobalOptions) -> CliResult<()> {
    let workspace = Workspace::open(super::current_workspace_dir()?)?;
    let reports = workspace.outdated().await?;

    if global.json {
        let rows: Vec<OutdatedRow> = reports
            .iter()
            .map(|r| OutdatedRow {
                alias: r.alias.clone(),
                name: r.name.to_string(),
                current: r.current.clone(),
                latest: r.latest.clone(),
                bump: r.bump.to_string(),
            })
            .collect();
        println!("{}", serde_json::to_string(&rows).map_err(anyhow::Error::from)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("all dependencies up to date");
        return Ok(());
    }
    for report in &reports {
        println!(
            "{} ({}) {} -> {} [{}]",
            report.alias, report.name, report.current, report.latest, report.bump
        );
    }
    Ok(())
}
