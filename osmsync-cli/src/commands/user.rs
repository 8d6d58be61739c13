//! User lookups.

use osmsync::model::User;

use super::common::Session;
use crate::error::CliError;

pub async fn run(session: &Session, ids: &[u64], me: bool) -> Result<(), CliError> {
    session.require_sign_in().await?;
    let service = &session.service;

    if me {
        let user = service.user_details().await?;
        print_user(&user);
        println!("  profile: {}", service.user_url(user.display_name.as_deref().unwrap_or("")));

        let changesets = service.user_changesets().await?;
        println!();
        println!("Recent changesets:");
        for changeset in &changesets {
            let id = changeset.id.map(|id| id.to_string()).unwrap_or_default();
            println!("  {} {}", id, changeset.comment().unwrap_or(""));
        }
    }

    if !ids.is_empty() {
        let mut users = service.load_users(ids).await?;
        users.sort_by_key(|u| u.id);
        for user in &users {
            print_user(user);
        }
    }
    Ok(())
}

fn print_user(user: &User) {
    println!(
        "{} {} ({} changesets)",
        user.id,
        user.display_name.as_deref().unwrap_or("?"),
        user.changesets_count
    );
    if let Some(created) = &user.account_created {
        println!("  since: {}", created);
    }
}
