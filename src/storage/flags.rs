//! One-shot flags and re-arming prompts
//!
//! Onboarding completion, install-prompt dismissal and media consent, all kept
//! in the [`PreferenceStore`]. Re-arming is decided on read by comparing the
//! stored expiry against `now`; there is no background timer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::preferences::PreferenceStore;
use crate::storage::StorageError;

pub const ONBOARDING_KEY: &str = "onboarding.completed";
pub const ONBOARDING_STEPS: usize = 4;

pub const INSTALL_DISMISSED_KEY: &str = "install_prompt.dismissed";
pub const INSTALL_ACCEPTED_KEY: &str = "install_prompt.installed";
pub const INSTALL_REMIND_HOURS: i64 = 24;

pub const MEDIA_REARM_HOURS: i64 = 24;

/// What got written when onboarding ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingRecord {
    /// Step the user was on (1-based)
    pub step: usize,
    pub skipped: bool,
}

/// Multi-step onboarding dialog state for one mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingFlow {
    step: usize,
    visible: bool,
}

impl OnboardingFlow {
    /// Read the completion flag; show the dialog when it is absent.
    pub fn mount(store: &PreferenceStore, now: DateTime<Utc>) -> Self {
        Self {
            step: 1,
            visible: !store.contains(ONBOARDING_KEY, now),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Current step, 1-based
    pub fn step(&self) -> usize {
        self.step
    }

    /// Advance one step. Moving past the last step completes the flow.
    pub fn next(
        &mut self,
        store: &mut PreferenceStore,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if !self.visible {
            return Ok(());
        }
        if self.step >= ONBOARDING_STEPS {
            return self.finish(store, now, false);
        }
        self.step += 1;
        Ok(())
    }

    pub fn back(&mut self) {
        if self.step > 1 {
            self.step -= 1;
        }
    }

    /// Skip from any step. The flag is written right away.
    pub fn skip(
        &mut self,
        store: &mut PreferenceStore,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.finish(store, now, true)
    }

    pub fn complete(
        &mut self,
        store: &mut PreferenceStore,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.finish(store, now, false)
    }

    fn finish(
        &mut self,
        store: &mut PreferenceStore,
        now: DateTime<Utc>,
        skipped: bool,
    ) -> Result<(), StorageError> {
        let record = OnboardingRecord {
            step: self.step,
            skipped,
        };
        store.set(ONBOARDING_KEY, &record, now)?;
        self.visible = false;
        tracing::debug!(step = self.step, skipped, "Onboarding finished");
        Ok(())
    }
}

/// "Install the app" prompt with a snooze window
#[derive(Debug, Clone)]
pub struct InstallPrompt {
    remind_after: Duration,
}

impl Default for InstallPrompt {
    fn default() -> Self {
        Self {
            remind_after: Duration::hours(INSTALL_REMIND_HOURS),
        }
    }
}

impl InstallPrompt {
    pub fn with_remind_after(remind_after: Duration) -> Self {
        Self { remind_after }
    }

    pub fn should_show(&self, store: &PreferenceStore, now: DateTime<Utc>) -> bool {
        !store.contains(INSTALL_ACCEPTED_KEY, now) && !store.contains(INSTALL_DISMISSED_KEY, now)
    }

    /// Hide the prompt until `now + remind_after`
    pub fn dismiss(
        &self,
        store: &mut PreferenceStore,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        store.set_with_ttl(INSTALL_DISMISSED_KEY, &true, self.remind_after, now)
    }

    /// Hide the prompt for good
    pub fn mark_installed(
        &self,
        store: &mut PreferenceStore,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        store.set(INSTALL_ACCEPTED_KEY, &true, now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaDevice {
    Microphone,
    Speaker,
}

impl MediaDevice {
    fn key(self) -> &'static str {
        match self {
            MediaDevice::Microphone => "permissions.microphone",
            MediaDevice::Speaker => "permissions.speaker",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
    Unknown,
    Granted,
    Denied,
}

/// Microphone/speaker consent. A grant sticks; a denial re-arms.
#[derive(Debug, Clone)]
pub struct MediaPermissions {
    rearm_after: Duration,
}

impl Default for MediaPermissions {
    fn default() -> Self {
        Self {
            rearm_after: Duration::hours(MEDIA_REARM_HOURS),
        }
    }
}

impl MediaPermissions {
    pub fn with_rearm_after(rearm_after: Duration) -> Self {
        Self { rearm_after }
    }

    pub fn state(
        &self,
        store: &PreferenceStore,
        device: MediaDevice,
        now: DateTime<Utc>,
    ) -> ConsentState {
        store
            .get_value::<ConsentState>(device.key(), now)
            .unwrap_or(ConsentState::Unknown)
    }

    pub fn should_request(
        &self,
        store: &PreferenceStore,
        device: MediaDevice,
        now: DateTime<Utc>,
    ) -> bool {
        self.state(store, device, now) == ConsentState::Unknown
    }

    pub fn record(
        &self,
        store: &mut PreferenceStore,
        device: MediaDevice,
        granted: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if granted {
            store.set(device.key(), &ConsentState::Granted, now)
        } else {
            store.set_with_ttl(device.key(), &ConsentState::Denied, self.rearm_after, now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_onboarding_shown_for_new_user() {
        let store = PreferenceStore::in_memory();
        let flow = OnboardingFlow::mount(&store, t0());
        assert!(flow.is_visible());
        assert_eq!(flow.step(), 1);
    }

    #[test]
    fn test_onboarding_skip_on_first_step_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut store = PreferenceStore::open(&path);
        let mut flow = OnboardingFlow::mount(&store, t0());
        flow.skip(&mut store, t0()).unwrap();
        assert!(!flow.is_visible());

        // Fresh mount from disk, as after a reload
        let reloaded = PreferenceStore::open(&path);
        let again = OnboardingFlow::mount(&reloaded, t0() + Duration::minutes(5));
        assert!(!again.is_visible());

        let record: OnboardingRecord = reloaded.get_value(ONBOARDING_KEY, t0()).unwrap();
        assert_eq!(record, OnboardingRecord { step: 1, skipped: true });
    }

    #[test]
    fn test_onboarding_next_through_all_steps_completes() {
        let mut store = PreferenceStore::in_memory();
        let mut flow = OnboardingFlow::mount(&store, t0());

        for _ in 1..ONBOARDING_STEPS {
            flow.next(&mut store, t0()).unwrap();
        }
        assert_eq!(flow.step(), ONBOARDING_STEPS);
        assert!(!store.contains(ONBOARDING_KEY, t0()));

        flow.next(&mut store, t0()).unwrap();
        assert!(!flow.is_visible());
        assert!(store.contains(ONBOARDING_KEY, t0()));
    }

    #[test]
    fn test_install_prompt_rearms_after_a_day() {
        let mut store = PreferenceStore::in_memory();
        let prompt = InstallPrompt::default();

        assert!(prompt.should_show(&store, t0()));
        prompt.dismiss(&mut store, t0()).unwrap();

        let just_before = t0() + Duration::hours(23) + Duration::minutes(59);
        let just_after = t0() + Duration::hours(24) + Duration::minutes(1);
        assert!(!prompt.should_show(&store, just_before));
        assert!(prompt.should_show(&store, t0() + Duration::hours(24)));
        assert!(prompt.should_show(&store, just_after));
    }

    #[test]
    fn test_install_prompt_installed_never_rearms() {
        let mut store = PreferenceStore::in_memory();
        let prompt = InstallPrompt::default();
        prompt.mark_installed(&mut store, t0()).unwrap();
        assert!(!prompt.should_show(&store, t0() + Duration::days(365)));
    }

    #[test]
    fn test_media_denial_rearms_but_grant_sticks() {
        let mut store = PreferenceStore::in_memory();
        let perms = MediaPermissions::with_rearm_after(Duration::hours(2));

        assert!(perms.should_request(&store, MediaDevice::Microphone, t0()));

        perms
            .record(&mut store, MediaDevice::Microphone, false, t0())
            .unwrap();
        perms
            .record(&mut store, MediaDevice::Speaker, true, t0())
            .unwrap();

        assert_eq!(
            perms.state(&store, MediaDevice::Microphone, t0() + Duration::hours(1)),
            ConsentState::Denied
        );
        assert!(perms.should_request(&store, MediaDevice::Microphone, t0() + Duration::hours(2)));
        assert_eq!(
            perms.state(&store, MediaDevice::Speaker, t0() + Duration::days(30)),
            ConsentState::Granted
        );
    }
}
