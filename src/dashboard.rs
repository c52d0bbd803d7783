use std::collections::VecDeque;

use crate::observation_store::ObservationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Teams,
    Players,
    Rival,
}

/// Selection state of the terminal dashboard. Holds names only; forecasts
/// are computed on render from the loaded context.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub focus: Focus,
    pub compare: bool,
    roster: Vec<(String, Vec<String>)>,
    all_players: Vec<String>,
    team_selected: usize,
    player_selected: usize,
    rival_selected: usize,
    pub status: String,
    pub logs: VecDeque<String>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardState {
    pub fn new() -> Self {
        Self {
            focus: Focus::Teams,
            compare: false,
            roster: Vec::new(),
            all_players: Vec::new(),
            team_selected: 0,
            player_selected: 0,
            rival_selected: 0,
            status: "loading".to_string(),
            logs: VecDeque::new(),
        }
    }

    /// Replaces teams and players, keeping the current selections by name
    /// where they still exist.
    pub fn set_roster(&mut self, roster: Vec<(String, Vec<String>)>) {
        let team = self.selected_team().map(str::to_string);
        let player = self.selected_player().map(str::to_string);
        let rival = self.selected_rival().map(str::to_string);

        let mut all_players: Vec<String> = roster
            .iter()
            .flat_map(|(_, players)| players.iter().cloned())
            .collect();
        all_players.sort();
        all_players.dedup();
        self.roster = roster;
        self.all_players = all_players;

        self.team_selected = team
            .and_then(|name| self.roster.iter().position(|(t, _)| *t == name))
            .unwrap_or(0);
        self.player_selected = player
            .and_then(|name| self.players().iter().position(|p| *p == name))
            .unwrap_or(0);
        self.rival_selected = rival
            .and_then(|name| self.all_players.iter().position(|p| *p == name))
            .unwrap_or(0);
    }

    pub fn roster_from_store(store: &ObservationStore) -> Vec<(String, Vec<String>)> {
        store
            .teams()
            .into_iter()
            .map(|team| {
                let players = store
                    .players_for_team(team)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                (team.to_string(), players)
            })
            .collect()
    }

    pub fn teams(&self) -> Vec<&str> {
        self.roster.iter().map(|(t, _)| t.as_str()).collect()
    }

    /// Players of the selected team.
    pub fn players(&self) -> &[String] {
        self.roster
            .get(self.team_selected)
            .map(|(_, players)| players.as_slice())
            .unwrap_or(&[])
    }

    pub fn rivals(&self) -> &[String] {
        &self.all_players
    }

    pub fn team_index(&self) -> usize {
        self.team_selected
    }

    pub fn player_index(&self) -> usize {
        self.player_selected
    }

    pub fn rival_index(&self) -> usize {
        self.rival_selected
    }

    pub fn selected_team(&self) -> Option<&str> {
        self.roster.get(self.team_selected).map(|(t, _)| t.as_str())
    }

    pub fn selected_player(&self) -> Option<&str> {
        self.players().get(self.player_selected).map(String::as_str)
    }

    pub fn selected_rival(&self) -> Option<&str> {
        if !self.compare {
            return None;
        }
        self.all_players.get(self.rival_selected).map(String::as_str)
    }

    pub fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Teams => Focus::Players,
            Focus::Players if self.compare => Focus::Rival,
            Focus::Players | Focus::Rival => Focus::Teams,
        };
    }

    pub fn toggle_compare(&mut self) {
        self.compare = !self.compare;
        if !self.compare && self.focus == Focus::Rival {
            self.focus = Focus::Players;
        }
    }

    pub fn select_next(&mut self) {
        let total = self.focused_len();
        let slot = self.focused_slot();
        *slot = if total == 0 { 0 } else { (*slot + 1) % total };
        self.after_move();
    }

    pub fn select_prev(&mut self) {
        let total = self.focused_len();
        let slot = self.focused_slot();
        *slot = if total == 0 {
            0
        } else if *slot == 0 {
            total - 1
        } else {
            *slot - 1
        };
        self.after_move();
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 50;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    fn focused_len(&self) -> usize {
        match self.focus {
            Focus::Teams => self.roster.len(),
            Focus::Players => self.players().len(),
            Focus::Rival => self.all_players.len(),
        }
    }

    fn focused_slot(&mut self) -> &mut usize {
        match self.focus {
            Focus::Teams => &mut self.team_selected,
            Focus::Players => &mut self.player_selected,
            Focus::Rival => &mut self.rival_selected,
        }
    }

    fn after_move(&mut self) {
        if self.focus == Focus::Teams {
            self.player_selected = 0;
        }
    }
}
