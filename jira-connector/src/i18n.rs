//! Card text in the languages the connector ships with.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    En,
    De,
    Es,
}

impl Language {
    /// Matches the primary subtag of a language tag, e.g. `de` in `de-CH`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.trim().split(['-', '_']).next()?;
        match primary.to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "de" => Some(Language::De),
            "es" => Some(Language::Es),
            _ => None,
        }
    }

    /// Language of the first entry of an `Accept-Language` value. Falls
    /// back to English when the header is absent or the language unsupported.
    pub fn from_accept_language(header: Option<&str>) -> Self {
        header
            .and_then(|value| value.split(',').next())
            .and_then(|range| range.split(';').next())
            .and_then(Language::from_tag)
            .unwrap_or_default()
    }

    pub fn messages(self) -> &'static Messages {
        match self {
            Language::En => &EN,
            Language::De => &DE,
            Language::Es => &ES,
        }
    }
}

pub struct Messages {
    pub project: &'static str,
    pub components: &'static str,
    pub priority: &'static str,
    pub reporter: &'static str,
    pub assignee: &'static str,
    pub unassigned: &'static str,
    pub status: &'static str,
    pub comments: &'static str,
    pub comment_action: &'static str,
    pub comment_completed: &'static str,
    pub comment_input: &'static str,
    pub watch_action: &'static str,
    pub watch_completed: &'static str,
    pub open_action: &'static str,
}

static EN: Messages = Messages {
    project: "Project",
    components: "Components",
    priority: "Priority",
    reporter: "Reporter",
    assignee: "Assignee",
    unassigned: "Unassigned",
    status: "Status",
    comments: "Latest comments",
    comment_action: "Comment",
    comment_completed: "Commented",
    comment_input: "Comment",
    watch_action: "Watch",
    watch_completed: "Watching",
    open_action: "Open in Jira",
};

static DE: Messages = Messages {
    project: "Projekt",
    components: "Komponenten",
    priority: "Priorität",
    reporter: "Autor",
    assignee: "Bearbeiter",
    unassigned: "Nicht zugewiesen",
    status: "Status",
    comments: "Neueste Kommentare",
    comment_action: "Kommentieren",
    comment_completed: "Kommentiert",
    comment_input: "Kommentar",
    watch_action: "Beobachten",
    watch_completed: "Beobachtet",
    open_action: "In Jira öffnen",
};

static ES: Messages = Messages {
    project: "Proyecto",
    components: "Componentes",
    priority: "Prioridad",
    reporter: "Informador",
    assignee: "Responsable",
    unassigned: "Sin asignar",
    status: "Estado",
    comments: "Últimos comentarios",
    comment_action: "Comentar",
    comment_completed: "Comentado",
    comment_input: "Comentario",
    watch_action: "Seguir",
    watch_completed: "Siguiendo",
    open_action: "Abrir en Jira",
};
