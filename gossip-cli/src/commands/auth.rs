//! Session commands: login, register, verify, logout, whoami.

use anyhow::{Context, Result};
use gossip_types::Identity;

use super::{require_login, Client};

/// Sign in and keep the token for later commands.
pub async fn login(client: &Client, email: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password("Password: ")?,
    };

    let identity = client.login(email, &password).await?;
    println!("Logged in as {}", describe(&identity));
    Ok(())
}

/// Create an account. The server emails an OTP for [`verify`].
pub async fn register(
    client: &Client,
    name: &str,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => {
            let first = prompt_password("Password: ")?;
            let second = prompt_password("Confirm password: ")?;
            if first != second {
                anyhow::bail!("Passwords do not match");
            }
            first
        }
    };

    let user_id = client.register(name, email, &password).await?;
    println!("Account created (id {})", user_id);
    println!();
    println!("Check your email, then run 'gossip-cli verify --email {} <otp>'", email);
    Ok(())
}

/// Verify a new account and sign in.
pub async fn verify(client: &Client, email: &str, otp: &str) -> Result<()> {
    let identity = client.verify_otp(email, otp.trim()).await?;
    println!("Verified. Logged in as {}", describe(&identity));
    Ok(())
}

/// Sign out. Succeeds even when the stored token is already gone.
pub async fn logout(client: &Client) -> Result<()> {
    if client.restore_session().await?.is_none() {
        println!("Not logged in");
        return Ok(());
    }
    client.logout().await?;
    println!("Logged out");
    Ok(())
}

/// Show the signed-in account.
pub async fn whoami(client: &Client) -> Result<()> {
    let identity = require_login(client).await?;
    println!("=== gossip-cli whoami ===");
    println!();
    println!("  ID:    {}", identity.user.id);
    println!("  Name:  {}", identity.user.name);
    println!("  Email: {}", identity.user.email);
    println!("  Theme: {}", client.theme().await?);
    Ok(())
}

fn describe(identity: &Identity) -> String {
    format!("{} <{}>", identity.user.name, identity.user.email)
}

fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    Ok(password)
}
