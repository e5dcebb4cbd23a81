use crate::error::CliResult;
use crate::GlobalOptions;

/// `init` is intentionally a stub: scaffolding a new DomainLang model
/// (source layout, stdlib wiring) is outside the dependency manager's
/// scope. This just points the user at writing model.yaml by hand.
pub async fn run(_global: &GlobalOptions) -> CliResult<()> {
    println!(
        "dlang init is not implemented yet. Create a model.yaml by hand:\n\n\
         model:\n  name: my-workspace\ndependencies:\n"
    );
    Ok(())
}
