//! Challenge handshake: a challenge waits for the challengee's answer
//! and lapses after a timeout.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::info;

use crate::clock::TimeControlSettings;
use crate::error::{ChessError, Result};
use crate::game::Game;
use crate::piece::Color;
use crate::player::{Player, PlayerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub challenger: PlayerId,
    pub challengee: PlayerId,
    pub challenger_color: Color,
    pub time_control: Option<TimeControlSettings>,
    pub board: String,
    pub created_at: Instant,
}

impl Challenge {
    pub fn is_expired(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= timeout
    }

    /// Builds the game this challenge asks for and starts it.
    pub fn into_game(self, now: Instant) -> Result<Game> {
        let challenger = Player::human(self.challenger);
        let challengee = Player::human(self.challengee);
        let (white, black) = match self.challenger_color {
            Color::White => (challenger, challengee),
            Color::Black => (challengee, challenger),
        };
        let mut game = Game::new(white, black, self.time_control);
        game.start(now)?;
        Ok(game)
    }
}

type ChallengeKey = (PlayerId, PlayerId);

/// Pending challenges, at most one per (challenger, challengee) pair.
#[derive(Debug, Clone)]
pub struct ChallengeBook {
    pending: HashMap<ChallengeKey, Challenge>,
    timeout: Duration,
}

impl ChallengeBook {
    pub fn new(timeout: Duration) -> Self {
        ChallengeBook {
            pending: HashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn create(
        &mut self,
        challenger: PlayerId,
        challengee: PlayerId,
        challenger_color: Color,
        time_control: Option<TimeControlSettings>,
        board: impl Into<String>,
        now: Instant,
    ) -> Result<&Challenge> {
        if challenger == challengee {
            return Err(ChessError::SelfChallenge);
        }
        let key = (challenger, challengee);
        if let Some(existing) = self.pending.get(&key) {
            if !existing.is_expired(self.timeout, now) {
                return Err(ChessError::ChallengeAlreadyPending(challengee));
            }
        }

        let challenge = Challenge {
            challenger,
            challengee,
            challenger_color,
            time_control,
            board: board.into(),
            created_at: now,
        };
        info!("{} challenged {} on board '{}'", challenger, challengee, challenge.board);
        self.pending.insert(key, challenge);
        Ok(&self.pending[&key])
    }

    /// Takes the challenge out of the book if it is still live.
    fn take(
        &mut self,
        challenger: PlayerId,
        challengee: PlayerId,
        now: Instant,
    ) -> Result<Challenge> {
        let challenge = self
            .pending
            .remove(&(challenger, challengee))
            .ok_or(ChessError::NoSuchChallenge)?;
        if challenge.is_expired(self.timeout, now) {
            return Err(ChessError::NoSuchChallenge);
        }
        Ok(challenge)
    }

    pub fn accept(
        &mut self,
        challenger: PlayerId,
        challengee: PlayerId,
        now: Instant,
    ) -> Result<Challenge> {
        let challenge = self.take(challenger, challengee, now)?;
        info!("{} accepted the challenge from {}", challengee, challenger);
        Ok(challenge)
    }

    pub fn deny(
        &mut self,
        challenger: PlayerId,
        challengee: PlayerId,
        now: Instant,
    ) -> Result<Challenge> {
        let challenge = self.take(challenger, challengee, now)?;
        info!("{} denied the challenge from {}", challengee, challenger);
        Ok(challenge)
    }

    pub fn get(&self, challenger: PlayerId, challengee: PlayerId) -> Option<&Challenge> {
        self.pending.get(&(challenger, challengee))
    }

    /// Removes and returns every challenge whose time ran out.
    pub fn expire_due(&mut self, now: Instant) -> Vec<Challenge> {
        let timeout = self.timeout;
        let expired: Vec<ChallengeKey> = self
            .pending
            .iter()
            .filter(|(_, challenge)| challenge.is_expired(timeout, now))
            .map(|(key, _)| *key)
            .collect();
        let mut removed: Vec<Challenge> = expired
            .iter()
            .filter_map(|key| self.pending.remove(key))
            .collect();
        removed.sort_by_key(|challenge| challenge.created_at);
        removed
    }

    /// Drops every challenge `player` sent or received.
    pub fn remove_involving(&mut self, player: PlayerId) -> Vec<Challenge> {
        let keys: Vec<ChallengeKey> = self
            .pending
            .keys()
            .filter(|(challenger, challengee)| *challenger == player || *challengee == player)
            .copied()
            .collect();
        keys.iter().filter_map(|key| self.pending.remove(key)).collect()
    }

    /// Drops every challenge aimed at `board`.
    pub fn remove_for_board(&mut self, board: &str) -> Vec<Challenge> {
        let keys: Vec<ChallengeKey> = self
            .pending
            .iter()
            .filter(|(_, challenge)| challenge.board == board)
            .map(|(key, _)| *key)
            .collect();
        keys.iter().filter_map(|key| self.pending.remove(key)).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameState;

    fn book() -> ChallengeBook {
        ChallengeBook::new(Duration::from_secs(30))
    }

    #[test]
    fn accept_within_timeout_starts_game() {
        let (alice, bob) = (PlayerId::new_v4(), PlayerId::new_v4());
        let now = Instant::now();
        let mut book = book();
        book.create(alice, bob, Color::Black, None, "main", now).unwrap();

        let challenge = book.accept(alice, bob, now + Duration::from_secs(10)).unwrap();
        assert!(book.is_empty());
        let game = challenge.into_game(now).unwrap();
        assert_eq!(game.color_of(alice), Some(Color::Black));
        assert_eq!(game.color_of(bob), Some(Color::White));
        assert_eq!(game.state(), GameState::InProgress);
    }

    #[test]
    fn expired_challenge_cannot_be_accepted() {
        let (alice, bob) = (PlayerId::new_v4(), PlayerId::new_v4());
        let now = Instant::now();
        let mut book = book();
        book.create(alice, bob, Color::White, None, "main", now).unwrap();
        let err = book.accept(alice, bob, now + Duration::from_secs(31)).unwrap_err();
        assert_eq!(err, ChessError::NoSuchChallenge);
        assert_eq!(book.deny(alice, bob, now).unwrap_err(), ChessError::NoSuchChallenge);
    }

    #[test]
    fn expiry_reports_each_challenge_once() {
        let (alice, bob, carol) = (PlayerId::new_v4(), PlayerId::new_v4(), PlayerId::new_v4());
        let now = Instant::now();
        let mut book = book();
        book.create(alice, bob, Color::White, None, "one", now).unwrap();
        book.create(carol, bob, Color::White, None, "two", now + Duration::from_secs(20)).unwrap();

        let expired = book.expire_due(now + Duration::from_secs(30));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].challenger, alice);
        assert!(book.expire_due(now + Duration::from_secs(30)).is_empty());
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn duplicate_and_self_challenges_rejected() {
        let (alice, bob) = (PlayerId::new_v4(), PlayerId::new_v4());
        let now = Instant::now();
        let mut book = book();
        assert_eq!(
            book.create(alice, alice, Color::White, None, "main", now).unwrap_err(),
            ChessError::SelfChallenge
        );
        book.create(alice, bob, Color::White, None, "main", now).unwrap();
        assert_eq!(
            book.create(alice, bob, Color::Black, None, "main", now).unwrap_err(),
            ChessError::ChallengeAlreadyPending(bob)
        );
        // The reverse direction is a different pair
        book.create(bob, alice, Color::White, None, "main", now).unwrap();
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn deny_discards() {
        let (alice, bob) = (PlayerId::new_v4(), PlayerId::new_v4());
        let now = Instant::now();
        let mut book = book();
        book.create(alice, bob, Color::White, None, "main", now).unwrap();
        book.deny(alice, bob, now).unwrap();
        assert_eq!(book.accept(alice, bob, now).unwrap_err(), ChessError::NoSuchChallenge);
    }

    #[test]
    fn removal_by_player_and_board() {
        let (alice, bob, carol) = (PlayerId::new_v4(), PlayerId::new_v4(), PlayerId::new_v4());
        let now = Instant::now();
        let mut book = book();
        book.create(alice, bob, Color::White, None, "one", now).unwrap();
        book.create(carol, alice, Color::White, None, "two", now).unwrap();
        book.create(bob, carol, Color::White, None, "two", now).unwrap();

        assert_eq!(book.remove_involving(alice).len(), 2);
        assert_eq!(book.remove_for_board("two").len(), 1);
        assert!(book.is_empty());
    }
}
