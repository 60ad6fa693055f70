use crate::backend::Issue;
use crate::credentials::join_url;
use crate::i18n::Language;
use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

pub const CONNECTOR_NAME: &str = "Jira";
const IMAGE_PATH: &str = "images/connector.png";
const MAX_COMMENTS: usize = 3;

/// Normalized representation of one issue for the notification surface.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Card {
    pub id: String,
    pub name: &'static str,
    pub header: CardHeader,
    pub body: CardBody,
    pub actions: Vec<CardAction>,
    pub image: CardImage,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CardHeader {
    pub title: String,
    pub subtitle: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CardBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<CardField>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardField {
    General {
        title: &'static str,
        description: String,
    },
    Comment {
        title: &'static str,
        content: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    UserInput,
    Direct,
    OpenIn,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CardAction {
    pub id: &'static str,
    pub label: &'static str,
    pub completed_label: Option<&'static str>,
    pub action_key: ActionKind,
    pub url: ActionUrl,
    #[serde(rename = "type")]
    pub method: &'static str,
    pub primary: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_input: Vec<UserInput>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionUrl {
    pub href: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserInput {
    pub id: &'static str,
    pub label: &'static str,
    pub min_length: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CardImage {
    pub href: String,
}

/// Request-scoped inputs of the card projection.
#[derive(Clone, Copy, Debug)]
pub struct CardContext<'a> {
    pub base_url: &'a Url,
    /// Public URL prefix this connector is reached under, ends with `/`
    pub routing_prefix: &'a str,
    pub language: Language,
}

impl CardContext<'_> {
    fn connector_url(&self, path: &str) -> String {
        join_url(self.routing_prefix, path)
    }

    fn backend_url(&self, path: &str) -> String {
        join_url(self.base_url.as_str(), path)
    }
}

/// Stable across requests for the same issue on the same Jira instance.
pub fn card_id(base_url: &Url, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base_url.as_str().trim_end_matches('/').as_bytes());
    hasher.update(b"\n");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn build_card(issue: &Issue, ctx: &CardContext<'_>) -> Card {
    let messages = ctx.language.messages();
    let key = issue.key.as_str();

    let mut fields = Vec::new();
    let mut general = |title, value: Option<&str>| {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            fields.push(CardField::General {
                title,
                description: value.to_string(),
            });
        }
    };
    let components = issue.components.join(", ");
    general(messages.project, issue.project.as_deref());
    general(messages.components, Some(components.as_str()));
    general(messages.priority, issue.priority.as_deref());
    general(messages.reporter, issue.reporter.as_deref());
    general(
        messages.assignee,
        Some(issue.assignee.as_deref().unwrap_or(messages.unassigned)),
    );
    general(messages.status, issue.status.as_deref());

    // newest first
    let comments: Vec<String> = issue
        .comments
        .iter()
        .rev()
        .take(MAX_COMMENTS)
        .map(|comment| format!("{} - {}", comment.author, comment.body))
        .collect();
    if !comments.is_empty() {
        fields.push(CardField::Comment {
            title: messages.comments,
            content: comments,
        });
    }

    let actions = vec![
        CardAction {
            id: "comment",
            label: messages.comment_action,
            completed_label: Some(messages.comment_completed),
            action_key: ActionKind::UserInput,
            url: ActionUrl {
                href: ctx.connector_url(&format!("api/v1/issues/{key}/comment")),
            },
            method: "POST",
            primary: true,
            user_input: vec![UserInput {
                id: "body",
                label: messages.comment_input,
                min_length: 1,
            }],
        },
        CardAction {
            id: "watch",
            label: messages.watch_action,
            completed_label: Some(messages.watch_completed),
            action_key: ActionKind::Direct,
            url: ActionUrl {
                href: ctx.connector_url(&format!("api/v1/issues/{key}/watchers")),
            },
            method: "POST",
            primary: false,
            user_input: Vec::new(),
        },
        CardAction {
            id: "open",
            label: messages.open_action,
            completed_label: None,
            action_key: ActionKind::OpenIn,
            url: ActionUrl {
                href: ctx.backend_url(&format!("browse/{key}")),
            },
            method: "GET",
            primary: false,
            user_input: Vec::new(),
        },
    ];

    Card {
        id: card_id(ctx.base_url, key),
        name: CONNECTOR_NAME,
        header: CardHeader {
            title: format!("[{key}] {}", issue.summary),
            subtitle: vec![key.to_string()],
        },
        body: CardBody {
            description: issue.description.clone().filter(|d| !d.is_empty()),
            fields,
        },
        actions,
        image: CardImage {
            href: ctx.connector_url(IMAGE_PATH),
        },
    }
}
