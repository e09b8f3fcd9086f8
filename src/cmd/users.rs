//! User administration — `tuinbeheer user`.

use anyhow::Result;
use console::style;

use super::super::UserCommands;
use tuinbeheer::config::TuinConfig;
use tuinbeheer::services::Caller;
use tuinbeheer::services::users::UserService;
use tuinbeheer::store::models::NewUserRequest;
use tuinbeheer::ui::icons::CHECK;
use tuinbeheer::web::service_context;

pub async fn cmd_user(config: &TuinConfig, command: UserCommands) -> Result<()> {
    let ctx = service_context(config, &config.db_path())?;
    let service = UserService::new(ctx);
    let caller = Caller::system();

    match command {
        UserCommands::Add {
            email,
            name,
            role,
            gardens,
        } => {
            let created = service
                .create(
                    &caller,
                    NewUserRequest {
                        email: Some(email),
                        full_name: Some(name),
                        role: Some(role),
                        garden_access: Some(gardens),
                    },
                )
                .await?;
            println!(
                "{}Created {} ({}, id {})",
                CHECK,
                created.user.email,
                created.user.role.as_str(),
                created.user.id
            );
            println!(
                "Temporary password: {}",
                style(&created.temporary_password).bold()
            );
            println!("{}", style("The user must change it at first login.").dim());
        }
        UserCommands::List => {
            let users = service.list(&caller).await?;
            if users.is_empty() {
                println!("No users found.");
                return Ok(());
            }
            for user in users {
                println!(
                    "{:>5}  {:<32} {:<24} {}",
                    user.id,
                    user.email,
                    user.full_name,
                    style(user.role.as_str()).cyan()
                );
            }
        }
    }
    Ok(())
}
