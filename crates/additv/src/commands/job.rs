use crate::cli::GlobalOpts;
use crate::commands::util;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let bridge = util::connect(global).await?;
    let job = bridge
        .session
        .next_job()
        .await
        .map_err(|e| CliError::from_core(e, &bridge.settings_path()))?;

    match job {
        Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
        None => println!("no job available"),
    }
    Ok(())
}
