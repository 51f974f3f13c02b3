//! Player-side mutable state during one play (component E). Ports
//! `RLiveStatus.py`'s `Voltage`, `Mental`, and `PlayerAttributes` classes.

use std::collections::HashMap;

/// Voltage points and the derived level/bonus/fever state.
///
/// Level thresholds come from [`crate::config::Config::points_for_level`]:
/// reaching level `L` costs `5*L*(L+1)` points up to `L=20`, then `200*L-1900`
/// per level beyond that. `level_for_points` walks incrementally from the
/// previous level rather than binary-searching, since points only ever
/// change by small per-note/per-skill increments.
#[derive(Debug, Clone)]
pub struct Voltage {
    current_points: i64,
    current_level: i64,
    pub level: i64,
    pub bonus: f64,
    pub fever: bool,
}

impl Voltage {
    pub fn new(initial_points: i64) -> Self {
        let mut v = Self {
            current_points: 0,
            current_level: 0,
            level: 0,
            bonus: 1.0,
            fever: false,
        };
        v.set_points(initial_points);
        v
    }

    /// Adds (or subtracts, for negative `amount`) Voltage points, clamped at
    /// zero, and recomputes the level/bonus.
    pub fn add_points(&mut self, amount: i64) {
        self.current_points = (self.current_points + amount).max(0);
        self.update_level();
    }

    pub fn set_points(&mut self, new_points: i64) {
        self.current_points = new_points.max(0);
        self.update_level();
    }

    pub fn points(&self) -> i64 {
        self.current_points
    }

    pub fn set_fever(&mut self, fever: bool) {
        self.fever = fever;
        self.update_level();
    }

    fn update_level(&mut self) {
        while self.current_points >= crate::config::Config::points_for_level(self.current_level + 1) {
            self.current_level += 1;
        }
        while self.current_level > 0
            && self.current_points < crate::config::Config::points_for_level(self.current_level)
        {
            self.current_level -= 1;
        }
        self.level = if self.fever {
            self.current_level * 2
        } else {
            self.current_level
        };
        self.bonus = (self.level as f64 + 10.0) / 10.0;
    }
}

/// Thrown by [`Mental::sub`] when HP reaches zero: the play ends immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MentalDown;

/// Note judgement, shared between the mental-HP penalty table and the
/// score-per-judgement table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgement {
    PerfectPlus,
    Perfect,
    Great,
    Good,
    Bad,
    Miss,
}

/// Current/max HP with judgement-driven penalties and skill-driven healing.
#[derive(Debug, Clone)]
pub struct Mental {
    pub current_hp: i64,
    pub max_hp: i64,
    bad_minus: i64,
    miss_minus: i64,
    trace_minus: i64,
}

impl Default for Mental {
    fn default() -> Self {
        Self {
            current_hp: 100,
            max_hp: 100,
            bad_minus: 30,
            miss_minus: 50,
            trace_minus: 20,
        }
    }
}

impl Mental {
    /// Sets max/current HP from the deck's summed card mental stat, and
    /// scales the per-judgement penalties by the new max (ported from
    /// `Mental.set_hp`'s `badMinus += int(max_hp * 0.03)` etc.).
    pub fn set_hp(&mut self, hp: i64) {
        self.max_hp = hp;
        self.current_hp = self.max_hp;
        self.bad_minus += (self.max_hp as f64 * 0.03) as i64;
        self.miss_minus += (self.max_hp as f64 * 0.05) as i64;
        self.trace_minus += (self.max_hp as f64 * 0.02) as i64;
    }

    /// Applies a BAD/MISS penalty; `note_type` distinguishes the reduced
    /// Trace/HoldMid MISS penalty from the standard one. Returns
    /// `Err(MentalDown)` once HP reaches zero.
    pub fn sub(&mut self, judgement: Judgement, note_type: Option<crate::chart::NoteEvent>) -> Result<(), MentalDown> {
        match judgement {
            Judgement::Miss => {
                let minus = match note_type {
                    Some(crate::chart::NoteEvent::Trace) | Some(crate::chart::NoteEvent::HoldMid) => {
                        self.trace_minus
                    }
                    _ => self.miss_minus,
                };
                self.current_hp = (self.current_hp - minus).max(0);
            }
            Judgement::Bad => {
                self.current_hp = (self.current_hp - self.bad_minus).max(0);
            }
            _ => {}
        }
        if self.current_hp == 0 {
            Err(MentalDown)
        } else {
            Ok(())
        }
    }

    /// Whether a MISS of this `note_type` would bring `current_hp` to zero
    /// or below, without applying it. Used by the Death-Note AFK policy to
    /// promote a borderline MISS back to PERFECT instead of ending the play.
    pub fn would_miss_kill(&self, note_type: Option<crate::chart::NoteEvent>) -> bool {
        let minus = match note_type {
            Some(crate::chart::NoteEvent::Trace) | Some(crate::chart::NoteEvent::HoldMid) => {
                self.trace_minus
            }
            _ => self.miss_minus,
        };
        self.current_hp - minus <= 0
    }

    /// Skill-driven heal: `value` is a percentage of max HP, ceiled, and
    /// clamped to `1..=max_hp` — a heal never overshoots `max_hp` and never
    /// itself triggers [`MentalDown`] (floors at 1, not 0).
    pub fn skill_gain(&mut self, value: f64) {
        let delta = (self.max_hp as f64 * value * 0.01).ceil() as i64;
        self.current_hp = (self.current_hp + delta).clamp(1, self.max_hp);
    }

    /// Skill-driven drain: `value` is a percentage of max HP, ceiled, and
    /// floored at 0 — unlike [`Mental::sub`], this never returns
    /// [`MentalDown`] even when it brings `current_hp` to 0; no current
    /// effect data reaches this branch, but the spec requires the
    /// no-throw floor-at-0 behavior regardless.
    pub fn skill_loss(&mut self, value: f64) {
        let delta = (self.max_hp as f64 * value * 0.01).ceil() as i64;
        self.current_hp = (self.current_hp - delta).max(0);
    }

    pub fn get_rate(&self) -> f64 {
        self.current_hp as f64 * 100.0 / self.max_hp as f64
    }
}

/// Full player-side state for one play: AP, combo, Voltage, Mental, score,
/// and the skill-queued rate-bonus FIFOs.
#[derive(Debug, Clone)]
pub struct PlayerAttributes {
    pub ap: f64,
    pub cooldown: f64,
    pub ap_rate: f64,
    pub combo: u32,
    pub ap_gain_rate: f64,
    pub voltage_gain_rate: f64,
    pub mental: Mental,
    pub score: i64,
    pub voltage: Voltage,
    pub next_score_gain_rate: Vec<f64>,
    pub next_voltage_gain_rate: Vec<f64>,
    pub cd_available: bool,
    pub master_level: u32,
    pub base_score: f64,
    pub note_score: HashMap<&'static str, f64>,
    pub half_ap_plus: f64,
    pub full_ap_plus: f64,
}

impl PlayerAttributes {
    pub fn new(master_level: u32) -> Self {
        Self {
            ap: 0.0,
            cooldown: 5.0,
            ap_rate: 1.0,
            combo: 0,
            ap_gain_rate: 100.0,
            voltage_gain_rate: 100.0,
            mental: Mental::default(),
            score: 0,
            voltage: Voltage::new(0),
            next_score_gain_rate: Vec::new(),
            next_voltage_gain_rate: Vec::new(),
            cd_available: false,
            master_level,
            base_score: 0.0,
            note_score: HashMap::new(),
            half_ap_plus: 0.0,
            full_ap_plus: 0.0,
        }
    }

    pub fn hp_calc(&mut self, deck_mental: i64) {
        self.mental.set_hp(deck_mental);
    }

    /// `basescore_calc`: derives `base_score` from deck appeal and master
    /// level, then the flat per-judgement score table and the half/full AP
    /// bonus-per-note constants, all normalized by chart note count.
    pub fn basescore_calc(&mut self, deck_appeal: i64, all_note_size: usize) {
        let masterlv_bonus = self.master_level as f64 / 100.0 + 1.0;
        self.base_score = deck_appeal as f64 * masterlv_bonus;
        let n = all_note_size as f64;
        self.note_score = [
            ("PERFECT+", 35.0 * self.base_score / n),
            ("PERFECT", 30.0 * self.base_score / n),
            ("GREAT", 25.0 * self.base_score / n),
            ("GOOD", 15.0 * self.base_score / n),
            ("BAD", 5.0 * self.base_score / n),
            ("MISS", 0.0),
        ]
        .into_iter()
        .collect();
        self.half_ap_plus = 300_000.0 / n;
        self.full_ap_plus = 600_000.0 / n;
    }

    /// Adds `value` to score after the Voltage bonus (and, for skill-driven
    /// gains, the `base_score` multiplier), ceiled. Returns the amount added.
    pub fn score_add(&mut self, value: f64, skill: bool) -> i64 {
        let mut value = value * self.voltage.bonus;
        if skill {
            value *= self.base_score;
        }
        let added = value.ceil() as i64;
        self.score += added;
        added
    }

    fn score_note(&mut self, judgement: Judgement) -> i64 {
        let key = judgement_key(judgement);
        let value = *self.note_score.get(key).unwrap_or(&0.0);
        self.score_add(value, false)
    }

    /// Full per-note combo update: AP gain, score-per-judgement, combo
    /// reset/Mental penalty on BAD/MISS. `note_type` distinguishes the
    /// reduced Trace/HoldMid MISS penalty.
    pub fn combo_add(
        &mut self,
        judgement: Judgement,
        note_type: Option<crate::chart::NoteEvent>,
    ) -> Result<(), MentalDown> {
        self.combo += 1;
        if self.combo <= 50 {
            self.ap_rate = 1.0 + (self.combo / 10) as f64 * 0.1;
        }
        match judgement {
            Judgement::PerfectPlus | Judgement::Perfect | Judgement::Great => {
                self.ap += (self.full_ap_plus * self.ap_rate).ceil() / 10000.0;
                self.score_note(judgement);
            }
            Judgement::Good => {
                self.ap += (self.half_ap_plus * self.ap_rate).ceil() * 0.0001;
                self.score_note(judgement);
            }
            Judgement::Bad | Judgement::Miss => {
                self.combo = 0;
                self.ap_rate = 1.0;
                self.mental.sub(judgement, note_type)?;
                if judgement == Judgement::Bad {
                    self.score_note(judgement);
                }
            }
        }
        Ok(())
    }
}

fn judgement_key(judgement: Judgement) -> &'static str {
    match judgement {
        Judgement::PerfectPlus => "PERFECT+",
        Judgement::Perfect => "PERFECT",
        Judgement::Great => "GREAT",
        Judgement::Good => "GOOD",
        Judgement::Bad => "BAD",
        Judgement::Miss => "MISS",
    }
}
