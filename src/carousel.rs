use anyhow::Result;

use crate::store::Store;
use crate::types::{UserId, UserProfile};

/// Followed users in follow order, with one of them centred.
#[derive(Debug, Clone, Default)]
pub struct Carousel {
    entries: Vec<UserProfile>,
    centered: usize,
}

impl Carousel {
    pub fn new(entries: Vec<UserProfile>) -> Self {
        Self {
            entries,
            centered: 0,
        }
    }

    /// Profiles of everyone `user` follows. Followed users without a profile
    /// are skipped.
    pub fn load(store: &Store, user: &UserId) -> Result<Self> {
        let mut entries = Vec::new();
        for id in store.following_list(user)? {
            if let Some(profile) = store.get_profile(&id)? {
                entries.push(profile);
            }
        }
        Ok(Self::new(entries))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[UserProfile] {
        &self.entries
    }

    pub fn centered_index(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.centered)
    }

    pub fn centered(&self) -> Option<&UserProfile> {
        self.entries.get(self.centered)
    }

    /// Move the centre one entry right. Returns true if it changed.
    pub fn next(&mut self) -> bool {
        if self.centered + 1 < self.entries.len() {
            self.centered += 1;
            true
        } else {
            false
        }
    }

    /// Move the centre one entry left. Returns true if it changed.
    pub fn prev(&mut self) -> bool {
        if self.centered > 0 {
            self.centered -= 1;
            true
        } else {
            false
        }
    }

    pub fn center_on(&mut self, user: &UserId) -> bool {
        match self.entries.iter().position(|p| &p.user_id == user) {
            Some(index) => {
                self.centered = index;
                true
            }
            None => false,
        }
    }
}
