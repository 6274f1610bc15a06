use tracing::debug;

use super::{
    dice::Dice,
    spec::{ActionKind, ActionTable},
};

/// Ticks without a renewed "play with" before a pet loses interest.
pub const ENGAGEMENT_TIMEOUT: i64 = 10;

pub const NOT_HUNGRY_TEXT: &str = "sniffs at their food and walks away";

const BEG_DELAY: (i64, i64) = (0, 9);
const SLEEP_DELAY: (i64, i64) = (0, 9);
const ENGAGED_PLAY_INTERVAL: (i64, i64) = (4, 10);
const DISENGAGED_PLAY_INTERVAL: (i64, i64) = (20, 110);
const IDLE_PLAY_INTERVAL: (i64, i64) = (30, 120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepState {
    Awake,
    PreparingSleep,
    Asleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HungerState {
    Sated,
    BeggingPending,
}

/// What a pet can see around it when deciding how to spend a tick.
#[derive(Debug, Default, Clone)]
pub struct Surroundings {
    pub owner_present: bool,
    /// Other pets living in the same channel.
    pub companions: Vec<String>,
    /// Channel members, excluding the bot itself.
    pub members: Vec<String>,
}

/// One pet: identity plus volatile behavioral counters. Only the identity
/// fields are persisted.
#[derive(Debug, Clone)]
pub struct Pet {
    pub name: String,
    pub owner: String,
    pub species: String,
    pub channel: Option<String>,

    pub hunger: i64,
    pub begging: bool,
    pub beg_delay: i64,

    pub tiredness: i64,
    pub sleeping: bool,
    pub ready_to_sleep: bool,
    pub sleep_delay: i64,
    pub wait_for_owner: bool,

    pub play_counter: i64,
    pub last_played_with: Option<String>,
    pub last_played_with_counter: i64,
}

impl Pet {
    pub fn new(
        name: impl Into<String>,
        owner: &str,
        species: impl Into<String>,
        channel: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.to_lowercase(),
            species: species.into(),
            channel,
            hunger: 0,
            begging: false,
            beg_delay: 0,
            tiredness: 0,
            sleeping: false,
            ready_to_sleep: false,
            sleep_delay: 0,
            wait_for_owner: false,
            play_counter: 0,
            last_played_with: None,
            last_played_with_counter: 0,
        }
    }

    pub fn sleep_state(&self) -> SleepState {
        if self.sleeping {
            SleepState::Asleep
        } else if self.ready_to_sleep {
            SleepState::PreparingSleep
        } else {
            SleepState::Awake
        }
    }

    pub fn hunger_state(&self) -> HungerState {
        if self.begging {
            HungerState::BeggingPending
        } else {
            HungerState::Sated
        }
    }

    pub fn is_owned_by(&self, nick: &str) -> bool {
        self.owner.eq_ignore_ascii_case(nick)
    }

    /// Action text for `kind`; `nick` defaults to the owner.
    pub fn action(
        &self,
        table: &ActionTable,
        kind: ActionKind,
        nick: Option<&str>,
        dice: &mut dyn Dice,
    ) -> String {
        let nick = nick.unwrap_or(&self.owner);
        table.choose(&self.species, kind, nick, dice)
    }

    /// Runs hunger, sleep, then play. Each step yields at most one line.
    pub fn tick(
        &mut self,
        table: &ActionTable,
        dice: &mut dyn Dice,
        around: &Surroundings,
    ) -> Vec<String> {
        [
            self.step_hunger(table, dice),
            self.step_sleep(table, dice, around.owner_present),
            self.step_play(table, dice, around),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn step_hunger(&mut self, table: &ActionTable, dice: &mut dyn Dice) -> Option<String> {
        let max = table.max_hunger;
        self.hunger = self.hunger.clamp(0, max);
        if self.sleep_state() != SleepState::Awake {
            return None;
        }

        if self.hunger < max {
            self.hunger += 1;
        }
        if self.hunger < max {
            return None;
        }

        if !self.begging {
            self.begging = true;
            self.beg_delay = dice.roll(BEG_DELAY.0, BEG_DELAY.1);
            debug!(pet = %self.name, delay = self.beg_delay, "hungry, begging soon");
            return None;
        }
        if self.beg_delay > 0 {
            self.beg_delay -= 1;
        }
        if self.beg_delay > 0 {
            return None;
        }

        self.begging = false;
        debug!(pet = %self.name, "begging");
        non_empty(self.action(table, ActionKind::Beg, None, dice))
    }

    pub fn step_sleep(
        &mut self,
        table: &ActionTable,
        dice: &mut dyn Dice,
        owner_present: bool,
    ) -> Option<String> {
        match self.sleep_state() {
            SleepState::Asleep => {
                if self.tiredness > 0 {
                    self.tiredness -= 1;
                    return None;
                }
                if self.wait_for_owner {
                    return None;
                }
                self.clear_sleep();
                debug!(pet = %self.name, "woke up");
                non_empty(self.action(table, ActionKind::Wake, None, dice))
            }
            SleepState::PreparingSleep => {
                if self.sleep_delay > 0 {
                    self.sleep_delay -= 1;
                }
                if self.sleep_delay > 0 {
                    return None;
                }
                self.ready_to_sleep = false;
                self.sleeping = true;
                debug!(pet = %self.name, tiredness = self.tiredness, "fell asleep");
                non_empty(self.action(table, ActionKind::Sleep, None, dice))
            }
            SleepState::Awake => {
                if self.tiredness > table.energy_threshold(&self.species) {
                    self.ready_to_sleep = true;
                    self.sleep_delay = dice.roll(SLEEP_DELAY.0, SLEEP_DELAY.1);
                    self.wait_for_owner = !owner_present;
                    debug!(
                        pet = %self.name,
                        delay = self.sleep_delay,
                        wait_for_owner = self.wait_for_owner,
                        "getting sleepy"
                    );
                } else {
                    self.tiredness += 1;
                }
                None
            }
        }
    }

    pub fn step_play(
        &mut self,
        table: &ActionTable,
        dice: &mut dyn Dice,
        around: &Surroundings,
    ) -> Option<String> {
        if self.last_played_with.is_some() {
            self.last_played_with_counter += 1;
            if self.last_played_with_counter >= ENGAGEMENT_TIMEOUT {
                debug!(pet = %self.name, "lost interest in playing");
                self.last_played_with = None;
                self.last_played_with_counter = 0;
                self.play_counter = dice.roll(DISENGAGED_PLAY_INTERVAL.0, DISENGAGED_PLAY_INTERVAL.1);
                return None;
            }
        }

        if self.sleeping {
            return None;
        }
        if self.play_counter > 0 {
            self.play_counter -= 1;
            return None;
        }

        if let Some(nick) = self.last_played_with.clone() {
            self.play_counter = dice.roll(ENGAGED_PLAY_INTERVAL.0, ENGAGED_PLAY_INTERVAL.1);
            return non_empty(self.action(table, ActionKind::PlayWith, Some(&nick), dice));
        }

        self.play_counter = dice.roll(IDLE_PLAY_INTERVAL.0, IDLE_PLAY_INTERVAL.1);
        let text = match dice.roll(0, 3) {
            2 if !around.companions.is_empty() => {
                let other = &around.companions[dice.pick(around.companions.len())];
                self.action(table, ActionKind::PlayWith, Some(other), dice)
            }
            3 => {
                let target = if around.members.is_empty() {
                    self.owner.clone()
                } else {
                    around.members[dice.pick(around.members.len())].clone()
                };
                self.action(table, ActionKind::PlayWith, Some(&target), dice)
            }
            _ => self.action(table, ActionKind::Play, None, dice),
        };
        non_empty(text)
    }

    /// Feeding only takes once the pet is at least three quarters hungry.
    pub fn feed(&mut self, table: &ActionTable, nick: &str, dice: &mut dyn Dice) -> String {
        if self.hunger * 4 < table.max_hunger * 3 {
            return NOT_HUNGRY_TEXT.to_string();
        }
        self.hunger = 0;
        self.begging = false;
        self.beg_delay = 0;
        debug!(pet = %self.name, by = nick, "fed");
        self.action(table, ActionKind::Eat, Some(nick), dice)
    }

    pub fn love_on(&self, table: &ActionTable, nick: &str, dice: &mut dyn Dice) -> String {
        self.action(table, ActionKind::Happy, Some(nick), dice)
    }

    pub fn beckon(&self, table: &ActionTable, nick: &str, dice: &mut dyn Dice) -> String {
        self.action(table, ActionKind::Greeting, Some(nick), dice)
    }

    pub fn play_with(&mut self, table: &ActionTable, nick: &str, dice: &mut dyn Dice) -> String {
        self.last_played_with = Some(nick.to_string());
        self.last_played_with_counter = 0;
        self.play_counter = dice.roll(ENGAGED_PLAY_INTERVAL.0, ENGAGED_PLAY_INTERVAL.1);
        self.action(table, ActionKind::PlayWith, Some(nick), dice)
    }

    /// Forces the pet awake. Text is produced only when it was actually
    /// asleep and `announce` is set.
    pub fn wake(&mut self, table: &ActionTable, dice: &mut dyn Dice, announce: bool) -> Option<String> {
        let was_asleep = match self.sleep_state() {
            SleepState::Awake => return None,
            SleepState::PreparingSleep => false,
            SleepState::Asleep => true,
        };
        self.clear_sleep();
        debug!(pet = %self.name, "woken by owner");
        if was_asleep && announce {
            non_empty(self.action(table, ActionKind::Wake, None, dice))
        } else {
            None
        }
    }

    /// Forces the pet asleep until its owner comes back. A pet already
    /// waiting for its owner stays silent.
    pub fn sleep_until_owner_returns(
        &mut self,
        table: &ActionTable,
        dice: &mut dyn Dice,
        announce: bool,
    ) -> Option<String> {
        if self.sleeping && self.wait_for_owner {
            return None;
        }
        self.ready_to_sleep = false;
        self.sleep_delay = 0;
        self.sleeping = true;
        self.wait_for_owner = true;
        debug!(pet = %self.name, "sleeping until owner returns");
        if !announce {
            return None;
        }
        let text = self.action(table, ActionKind::Sleep, None, dice);
        non_empty(text).map(|text| format!("{text}, waiting for {} to return", self.owner))
    }

    pub fn describe(&self, table: &ActionTable) -> String {
        let sleep = match self.sleep_state() {
            SleepState::Awake => "awake",
            SleepState::PreparingSleep => "getting sleepy",
            SleepState::Asleep if self.wait_for_owner => "asleep, waiting for its owner",
            SleepState::Asleep => "asleep",
        };
        format!(
            "{} the {} (owner {}): hunger {}/{}, {}",
            self.name, self.species, self.owner, self.hunger, table.max_hunger, sleep
        )
    }

    fn clear_sleep(&mut self) {
        self.sleeping = false;
        self.ready_to_sleep = false;
        self.sleep_delay = 0;
        self.wait_for_owner = false;
        self.tiredness = 0;
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}
