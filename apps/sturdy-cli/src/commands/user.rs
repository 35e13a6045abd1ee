// user.rs — `sturdy user …`

use clap::Subcommand;

use sturdy_workspace::User;

use super::App;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a user.
    Create {
        name: String,
        #[arg(long)]
        email: String,
    },
}

pub fn run(app: &App, command: UserCommands) -> anyhow::Result<()> {
    match command {
        UserCommands::Create { name, email } => {
            let user = User::new(name, email);
            app.users.save(&user)?;
            println!("{}  {}", user.id, user.name);
        }
    }
    Ok(())
}
