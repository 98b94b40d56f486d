//! Request handlers.
//!
//! Every state change follows the same order: mutate the table, release it,
//! then publish the new snapshot to observers.

use std::net::SocketAddr;

use axum::{
    Form, Json,
    extract::{ConnectInfo, State},
};
use axum_extra::extract::cookie::CookieJar;
use d20_core::{
    Environment, EventKind, Participant, Roll, RollRequest, StatsUpdate, TableStats,
    mask_origin, parse_trait_list,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{Authenticated, Facilitator, cleared_session_cookie, session_cookie},
    config::TableConfig,
    error::ApiError,
    state::AppState,
};

/// Join form.
#[derive(Debug, Deserialize)]
pub struct JoinForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    character_name: String,
    #[serde(default)]
    party_key: String,
}

/// Roll form. Fields arrive as text and are parsed here.
#[derive(Debug, Default, Deserialize)]
pub struct RollForm {
    #[serde(default)]
    sides: String,
    #[serde(default)]
    num: String,
    #[serde(default)]
    critical_at: Option<String>,
    #[serde(default)]
    complication_at: Option<String>,
}

/// Facilitator stats form. Absent or blank numeric fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct StatsForm {
    #[serde(default)]
    threat: Option<String>,
    #[serde(default)]
    momentum: Option<String>,
    #[serde(default)]
    scene_traits: Option<String>,
    #[serde(default)]
    character: Option<String>,
    #[serde(default)]
    character_traits: Option<String>,
}

/// Roll history response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Rolls, most recent first.
    pub history: Vec<Roll>,
}

fn parse_int(field: &'static str, raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {field}: {raw:?}")))
}

fn parse_optional_int(field: &'static str, raw: Option<&str>) -> Result<Option<i64>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_int(field, raw).map(Some),
    }
}

impl RollForm {
    fn to_request(&self, config: &TableConfig) -> Result<RollRequest, ApiError> {
        let sides = parse_int("number of sides", &self.sides)?;
        let count = parse_int("number of dice", &self.num)?;

        if sides > config.max_sides {
            return Err(ApiError::BadRequest(format!(
                "at most {} sides per die",
                config.max_sides
            )));
        }
        if count > config.max_dice {
            return Err(ApiError::BadRequest(format!("at most {} dice per roll", config.max_dice)));
        }

        let mut request = RollRequest::new(sides, count);
        let critical_at = parse_optional_int("critical threshold", self.critical_at.as_deref())?;
        let complication_at =
            parse_optional_int("complication threshold", self.complication_at.as_deref())?;
        request = request.with_thresholds(
            critical_at.unwrap_or(request.critical_at),
            complication_at.unwrap_or(request.complication_at),
        );
        Ok(request)
    }
}

impl StatsForm {
    fn to_update(&self) -> Result<StatsUpdate, ApiError> {
        let character_traits = self
            .character
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                let traits = parse_trait_list(self.character_traits.as_deref().unwrap_or_default());
                (name.to_string(), traits)
            });

        Ok(StatsUpdate {
            threat: parse_optional_int("threat", self.threat.as_deref())?,
            momentum: parse_optional_int("momentum", self.momentum.as_deref())?,
            scene_traits: self.scene_traits.as_deref().map(parse_trait_list),
            character_traits,
        })
    }
}

/// `POST /join`: mint a participant and set the session cookie.
pub async fn join<E: Environment>(
    State(state): State<AppState<E>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    jar: CookieJar,
    Form(form): Form<JoinForm>,
) -> Result<(CookieJar, Json<Participant>), ApiError> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("you must enter a name".to_string()));
    }
    if form.party_key != state.config.party_key {
        tracing::info!(origin = %mask_origin(peer.ip()), "join refused: wrong party key");
        return Err(ApiError::WrongPartyKey);
    }

    let character_name = form.character_name.trim();
    let participant = if character_name == state.config.facilitator_name {
        Participant::facilitator(name, character_name, mask_origin(peer.ip()))
    } else {
        Participant::player(name, character_name, mask_origin(peer.ip()))
    };

    let token = state.codec.issue(&participant)?;
    tracing::info!(
        name = %participant.name,
        facilitator = participant.is_facilitator,
        origin = %participant.masked_origin,
        "participant joined"
    );

    Ok((jar.add(session_cookie(token)), Json(participant)))
}

/// `POST /logout`: clear the session cookie.
pub async fn logout(jar: CookieJar) -> CookieJar {
    jar.remove(cleared_session_cookie())
}

/// `GET /session`: the caller's verified identity.
pub async fn session(Authenticated(participant): Authenticated) -> Json<Participant> {
    Json(participant)
}

/// `GET /history`: every roll, most recent first.
pub async fn history<E: Environment>(
    State(state): State<AppState<E>>,
    _: Authenticated,
) -> Json<HistoryResponse> {
    Json(HistoryResponse { history: state.table.sorted_rolls() })
}

/// `GET /stats`: current facilitator stats.
pub async fn stats<E: Environment>(
    State(state): State<AppState<E>>,
    _: Authenticated,
) -> Json<TableStats> {
    Json(state.table.stats())
}

/// `POST /roll`: roll, record, and broadcast.
pub async fn roll<E: Environment>(
    State(state): State<AppState<E>>,
    Authenticated(participant): Authenticated,
    Form(form): Form<RollForm>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let request = form.to_request(&state.config)?;
    let roll = state.dice.roll(request, &participant)?;
    tracing::debug!(
        name = %participant.name,
        sides = roll.sides,
        dice = %roll,
        criticals = roll.criticals(),
        complications = roll.complications(),
        "rolled"
    );

    state.table.append_roll(roll);
    state.hub.publish(EventKind::Roll, &state.table);

    Ok(Json(HistoryResponse { history: state.table.sorted_rolls() }))
}

/// `POST /private-roll`: roll for the facilitator's eyes only.
pub async fn private_roll<E: Environment>(
    State(state): State<AppState<E>>,
    Facilitator(participant): Facilitator,
    Form(form): Form<RollForm>,
) -> Result<Json<Roll>, ApiError> {
    let request = form.to_request(&state.config)?;
    Ok(Json(state.dice.roll(request, &participant)?))
}

/// `POST /facilitator`: update stats atomically and broadcast.
pub async fn update_stats<E: Environment>(
    State(state): State<AppState<E>>,
    Facilitator(participant): Facilitator,
    Form(form): Form<StatsForm>,
) -> Result<Json<TableStats>, ApiError> {
    let update = form.to_update()?;
    if update.is_empty() {
        return Ok(Json(state.table.stats()));
    }

    let stats = state.table.apply(update);
    tracing::debug!(
        name = %participant.name,
        threat = stats.threat,
        momentum = stats.momentum,
        "stats updated"
    );
    state.hub.publish(EventKind::Stats, &state.table);

    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(sides: &str, num: &str) -> RollForm {
        RollForm { sides: sides.into(), num: num.into(), ..RollForm::default() }
    }

    #[test]
    fn roll_form_defaults_thresholds() {
        let request = form("20", "2").to_request(&TableConfig::new("GM", "k")).unwrap();

        assert_eq!(request.critical_at, 1);
        assert_eq!(request.complication_at, 20);
    }

    #[test]
    fn roll_form_blank_threshold_uses_default() {
        let mut f = form("20", "2");
        f.critical_at = Some(" ".into());
        f.complication_at = Some("19".into());

        let request = f.to_request(&TableConfig::new("GM", "k")).unwrap();
        assert_eq!(request.critical_at, 1);
        assert_eq!(request.complication_at, 19);
    }

    #[test]
    fn roll_form_rejects_non_numeric() {
        let config = TableConfig::new("GM", "k");

        assert!(matches!(form("d20", "1").to_request(&config), Err(ApiError::BadRequest(_))));
        assert!(matches!(form("20", "").to_request(&config), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn roll_form_enforces_limits() {
        let config = TableConfig::new("GM", "k");

        assert!(form("1001", "1").to_request(&config).is_err());
        assert!(form("20", "101").to_request(&config).is_err());
        assert!(form("1000", "100").to_request(&config).is_ok());
    }

    #[test]
    fn stats_form_ignores_blank_numbers() {
        let update = StatsForm {
            threat: Some(String::new()),
            momentum: Some("3".into()),
            ..StatsForm::default()
        }
        .to_update()
        .unwrap();

        assert_eq!(update.threat, None);
        assert_eq!(update.momentum, Some(3));
        assert_eq!(update.scene_traits, None);
    }

    #[test]
    fn stats_form_parses_traits() {
        let update = StatsForm {
            scene_traits: Some("dark, cramped ,".into()),
            character: Some(" Data ".into()),
            character_traits: None,
            ..StatsForm::default()
        }
        .to_update()
        .unwrap();

        assert_eq!(update.scene_traits, Some(vec!["dark".to_string(), "cramped".to_string()]));
        assert_eq!(update.character_traits, Some(("Data".to_string(), vec![])));
    }
}
