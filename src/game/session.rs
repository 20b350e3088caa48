//! Sessions, teams and privilege levels

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Game-engine assigned player id
pub type SessionId = u32;

/// Authorization level, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    Guest,
    Player,
    Moderator,
    Admin,
}

impl Default for Privilege {
    fn default() -> Self {
        Self::Player
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    Blue,
    Green,
}

impl TeamSide {
    pub fn other(self) -> Self {
        match self {
            TeamSide::Blue => TeamSide::Green,
            TeamSide::Green => TeamSide::Blue,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Team {
    pub side: TeamSide,
    pub name: String,
}

/// Both teams of the match. Sessions hold shared references into this.
#[derive(Debug, Clone)]
pub struct Teams {
    blue: Arc<Team>,
    green: Arc<Team>,
}

impl Teams {
    pub fn new(blue_name: impl Into<String>, green_name: impl Into<String>) -> Self {
        Self {
            blue: Arc::new(Team {
                side: TeamSide::Blue,
                name: blue_name.into(),
            }),
            green: Arc::new(Team {
                side: TeamSide::Green,
                name: green_name.into(),
            }),
        }
    }

    pub fn get(&self, side: TeamSide) -> &Arc<Team> {
        match side {
            TeamSide::Blue => &self.blue,
            TeamSide::Green => &self.green,
        }
    }

    /// The team opposing `team`
    pub fn other(&self, team: &Team) -> &Arc<Team> {
        self.get(team.side.other())
    }
}

impl Default for Teams {
    fn default() -> Self {
        Self::new("Blue", "Green")
    }
}

/// A connected player
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub printable_name: String,
    pub team: Arc<Team>,
    pub privilege: Privilege,
}

impl Session {
    pub fn new(id: SessionId, name: impl Into<String>, team: Arc<Team>, privilege: Privilege) -> Self {
        Self {
            id,
            printable_name: name.into(),
            team,
            privilege,
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.printable_name, self.id)
    }
}
