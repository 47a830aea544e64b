use serde_derive::Serialize;
use strum::EnumIter;
use strum::EnumVariantNames;

/// Documents a session holds besides its history and scripts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum ArtifactKind {
    Reply,
    Graph,
    Descriptions,
}

impl ArtifactKind {
    pub fn file_name(&self) -> &'static str {
        return match self {
            ArtifactKind::Reply => "reply.txt",
            ArtifactKind::Graph => "graph.json",
            ArtifactKind::Descriptions => "descriptions.json",
        };
    }
}

/// How published documents are laid out in the shared mirror directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumVariantNames, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MirrorLayout {
    /// Fixed file names shared by every session, last publisher wins.
    Shared,
    /// One sub directory per session key.
    Session,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub session_written: Vec<String>,
    pub mirrored: Vec<String>,
    pub failures: Vec<String>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        return self.failures.is_empty();
    }
}
