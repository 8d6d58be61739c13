//! Server status and imagery blacklist.

use osmsync::model::ApiStatus;

use super::common::Session;
use crate::error::CliError;

pub async fn run(session: &Session) -> Result<(), CliError> {
    let service = &session.service;
    let status = service.status().await?;

    let label = match &status {
        ApiStatus::Online => "online",
        ApiStatus::Readonly => "readonly",
        ApiStatus::Offline => "offline",
        ApiStatus::Unknown(s) => s.as_str(),
    };
    println!("{}: {}", service.url_root(), label);

    println!();
    println!("Imagery blacklist:");
    for pattern in service.imagery_blacklists() {
        println!("  {}", pattern);
    }
    Ok(())
}
