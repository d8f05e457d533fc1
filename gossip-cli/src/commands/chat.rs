//! Conversation commands: send, history, groups, watch, theme.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gossip_client::UiEvent;
use gossip_core::{GroupForm, NoticeLevel, Role, Theme};
use gossip_types::{AttachmentKind, Message, MessageBody, UserId};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;

use super::{require_login, Client, Target};

/// Send a message, with an optional attachment.
pub async fn send(
    client: &Client,
    target: Target,
    message: Option<String>,
    file: Option<&Path>,
) -> Result<()> {
    require_login(client).await?;

    let (file, file_type) = match file {
        Some(path) => {
            let (kind, data) = encode_attachment(path).await?;
            (Some(data), Some(kind))
        }
        None => (None, None),
    };
    let body = MessageBody {
        text: message,
        file,
        file_type,
    };

    open(client, &target).await?;
    let sent = client.send_message(body).await?;
    println!("Sent {} at {}", sent.id, sent.created_at.format("%Y-%m-%d %H:%M"));
    Ok(())
}

/// Print the history of a conversation.
pub async fn history(client: &Client, target: Target, json: bool) -> Result<()> {
    let identity = require_login(client).await?;
    open(client, &target).await?;

    let messages = client.conversation().messages().await;
    if json {
        for message in &messages {
            println!("{}", serde_json::to_string(message)?);
        }
        return Ok(());
    }

    if messages.is_empty() {
        println!("No messages yet");
        return Ok(());
    }
    for message in &messages {
        println!("{}", render(message, &identity.user.id));
    }
    Ok(())
}

/// List groups.
pub async fn groups(client: &Client) -> Result<()> {
    let identity = require_login(client).await?;
    let groups = client.load_groups().await?;

    if groups.is_empty() {
        println!("No groups yet");
        return Ok(());
    }
    println!("Groups ({}):", groups.len());
    for group in &groups {
        let admin = if group.admins.contains(&identity.user.id) {
            " (admin)"
        } else {
            ""
        };
        println!(
            "    {:<24} {}{} [{} members]",
            group.id,
            group.name,
            admin,
            group.members.len() + group.admins.len()
        );
    }
    Ok(())
}

/// Create a group. The creator is always an admin.
pub async fn create_group(
    client: &Client,
    name: &str,
    description: &str,
    members: Vec<String>,
    admins: Vec<String>,
) -> Result<()> {
    require_login(client).await?;

    let mut form = GroupForm::named(name);
    form.description = description.to_string();
    for member in members {
        form.roles.set(UserId::from(member), Role::Member);
    }
    for admin in admins {
        form.roles.set(UserId::from(admin), Role::Admin);
    }

    let group = client.create_group(form).await?;
    println!("Group created: {} ({})", group.name, group.id);
    Ok(())
}

/// Print notices and incoming messages until the session ends.
pub async fn watch(client: &Client) -> Result<()> {
    let identity = require_login(client).await?;
    println!("Watching as {} (Ctrl-C to stop)", identity.user.name);

    let mut events = client.subscribe();
    let run = client.run();
    tokio::pin!(run);

    loop {
        tokio::select! {
            result = &mut run => {
                // Print whatever the teardown announced.
                while let Ok(event) = events.try_recv() {
                    print_event(&event);
                }
                result?;
                println!("Session ended");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

/// Show the theme, or switch to `name`.
pub async fn theme(client: &Client, name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => {
            let theme: Theme = name.parse()?;
            client.set_theme(theme).await?;
            println!("Theme set to {}", theme);
        }
        None => {
            let current = client.theme().await?;
            println!("Theme: {}", current);
            println!();
            let all: Vec<&str> = Theme::ALL.iter().map(Theme::id).collect();
            println!("Available: {}", all.join(", "));
        }
    }
    Ok(())
}

async fn open(client: &Client, target: &Target) -> Result<()> {
    match target {
        Target::Peer(user) => client.open_peer(user.clone()).await?,
        Target::Group(group) => client.open_group(group.clone()).await?,
    }
    Ok(())
}

fn print_event(event: &UiEvent) {
    match event {
        UiEvent::Notice(notice) => {
            let tag = match notice.level {
                NoticeLevel::Info => "info",
                NoticeLevel::Success => "ok",
                NoticeLevel::Error => "error",
            };
            println!("[{}] {}", tag, notice.text);
        }
        UiEvent::IncomingMessage {
            from,
            group,
            preview,
        } => match group {
            Some(group) => println!("[{}] {}: {}", group, from, preview),
            None => println!("{}: {}", from, preview),
        },
        UiEvent::Changed(topic) => {
            tracing::debug!(?topic, "state changed");
        }
    }
}

fn render(message: &Message, me: &UserId) -> String {
    let author = if &message.sender_id == me {
        "you".to_string()
    } else {
        message.sender_id.to_string()
    };
    let mut body = message.text.clone().unwrap_or_default();
    if let Some(kind) = message.file_type {
        if !body.is_empty() {
            body.push(' ');
        }
        body.push_str(&format!("[{}]", kind.label()));
    }
    format!(
        "{} {}: {}",
        message.created_at.format("%Y-%m-%d %H:%M"),
        author,
        body
    )
}

/// Read a file into a `data:` URL the server stores inline.
async fn encode_attachment(path: &Path) -> Result<(AttachmentKind, String)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (kind, mime) = classify(path);
    Ok((kind, format!("data:{};base64,{}", mime, STANDARD.encode(bytes))))
}

/// Attachment kind and MIME type from the file extension.
fn classify(path: &Path) -> (AttachmentKind, &'static str) {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" => (AttachmentKind::Image, "image/png"),
        "jpg" | "jpeg" => (AttachmentKind::Image, "image/jpeg"),
        "gif" => (AttachmentKind::Image, "image/gif"),
        "webp" => (AttachmentKind::Image, "image/webp"),
        "mp4" => (AttachmentKind::Video, "video/mp4"),
        "webm" => (AttachmentKind::Video, "video/webm"),
        "mov" => (AttachmentKind::Video, "video/quicktime"),
        "mp3" => (AttachmentKind::Audio, "audio/mpeg"),
        "wav" => (AttachmentKind::Audio, "audio/wav"),
        "ogg" => (AttachmentKind::Audio, "audio/ogg"),
        "pdf" => (AttachmentKind::Pdf, "application/pdf"),
        "txt" => (AttachmentKind::Document, "text/plain"),
        "doc" => (AttachmentKind::Document, "application/msword"),
        "docx" => (
            AttachmentKind::Document,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        _ => (AttachmentKind::Other, "application/octet-stream"),
    }
}
