//! Contact commands: friends, requests, blocking.

use anyhow::Result;
use clap::ValueEnum;
use gossip_core::ToggleOutcome;
use gossip_types::{User, UserId};

use super::{require_login, Client};

/// What to do with a friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RequestAction {
    /// Send a request, or cancel the pending one
    Send,
    /// Accept a received request
    Accept,
    /// Reject a received request
    Reject,
    /// Cancel a sent request
    Cancel,
    /// End the friendship
    Unfriend,
}

/// List friends, marking the ones online.
pub async fn friends(client: &Client) -> Result<()> {
    require_login(client).await?;
    let friends = client.load_friends().await?;
    client.load_online_friends().await?;
    let session = client.session().snapshot().await;

    if friends.is_empty() {
        println!("No friends yet. Send a request with 'gossip-cli request <user-id>'.");
        return Ok(());
    }

    println!("Friends ({}):", friends.len());
    for friend in &friends {
        let marker = if session.is_online(&friend.id) { "*" } else { " " };
        println!("  {} {}", marker, line(friend));
    }
    println!();
    println!("* online");
    Ok(())
}

/// List pending friend requests in both directions.
pub async fn requests(client: &Client) -> Result<()> {
    require_login(client).await?;
    client.load_requests().await?;
    let graph = client.social().snapshot().await;

    println!("Received ({}):", graph.received_requests().len());
    for user in graph.received_requests() {
        println!("    {}", line(user));
    }
    println!();
    println!("Sent ({}):", graph.sent_requests().len());
    for user in graph.sent_requests() {
        println!("    {}", line(user));
    }
    Ok(())
}

/// Act on the relationship with `user`.
pub async fn request(client: &Client, user: &UserId, action: RequestAction) -> Result<()> {
    require_login(client).await?;
    // Acting on a user needs their details for the listings.
    client.load_users().await?;
    client.load_requests().await?;

    match action {
        RequestAction::Send => match client.toggle_friend_request(user).await? {
            ToggleOutcome::Sent => println!("Friend request sent to {}", user),
            ToggleOutcome::Cancelled => println!("Friend request to {} cancelled", user),
            ToggleOutcome::Unchanged => println!("Nothing changed"),
        },
        RequestAction::Accept => {
            client.accept_friend_request(user).await?;
            println!("You and {} are now friends", user);
        }
        RequestAction::Reject => {
            client.reject_friend_request(user).await?;
            println!("Friend request from {} rejected", user);
        }
        RequestAction::Cancel => {
            client.cancel_friend_request(user).await?;
            println!("Friend request to {} cancelled", user);
        }
        RequestAction::Unfriend => {
            client.unfriend(user).await?;
            println!("Unfriended {}", user);
        }
    }
    Ok(())
}

/// Block `user`, or lift the block.
pub async fn block(client: &Client, user: &UserId, undo: bool) -> Result<()> {
    require_login(client).await?;
    if undo {
        client.unblock_user(user).await?;
        println!("Unblocked {}", user);
    } else {
        client.block_user(user).await?;
        println!("Blocked {}", user);
    }
    Ok(())
}

fn line(user: &User) -> String {
    match &user.last_message {
        Some(preview) => format!("{:<24} {:<20} {}", user.id, user.name, preview),
        None => format!("{:<24} {}", user.id, user.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str, preview: Option<&str>) -> User {
        User {
            id: id.into(),
            name: name.into(),
            email: format!("{}@example.com", name),
            profile_pic: None,
            last_message: preview.map(str::to_string),
            last_message_at: None,
        }
    }

    #[test]
    fn line_shows_preview_when_present() {
        let with = line(&user("u1", "bob", Some("hi there")));
        assert!(with.starts_with("u1"));
        assert!(with.ends_with("hi there"));

        let without = line(&user("u2", "carol", None));
        assert!(without.ends_with("carol"));
    }
}
