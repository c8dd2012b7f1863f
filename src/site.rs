use tracing::{info, info_span, instrument};
use url::Url;

use crate::error::Error;

/// League site endpoint serving every team page behind query parameters.
pub const BASE_TEAM_URL: &str = "https://www.amherstadulthockey.com/teams/default.asp";

/// Hosted calendar feed, one ICS file per team id.
const CALENDAR_URL_TEMPLATE: &str =
    "https://media.hometeamsonline.com/photos/hockey/{team_id}/data/schedule.ics";

/// The site serves stripped-down pages to clients without a browser-looking
/// user agent string.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Build a fully qualified league page URL for a team and page type, e.g.
/// `page = "scores"` or `page = "roster"`. Extra query parameters are appended
/// after the standard `u`/`s`/`p` triple.
pub fn team_page_url(team_id: &str, page: &str, extra: &[(&str, &str)]) -> Result<String, Error> {
    let mut url = Url::parse(BASE_TEAM_URL).map_err(|e| Error::Url {
        url: BASE_TEAM_URL.to_string(),
        reason: e.to_string(),
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("u", team_id);
        pairs.append_pair("s", "hockey");
        pairs.append_pair("p", page);
        for (key, value) in extra {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.into())
}

/// URL of the box score page for one game.
pub fn box_score_url(team_id: &str, game_id: &str) -> Result<String, Error> {
    team_page_url(team_id, "boxscore", &[("gameID", game_id)])
}

/// URL of the hosted ICS calendar feed for a team.
pub fn calendar_url(team_id: &str) -> String {
    CALENDAR_URL_TEMPLATE.replace("{team_id}", team_id)
}

/// Fetch a page body as text. Non-success HTTP statuses are an error; the
/// response body is not inspected here.
#[instrument(level = "info", skip_all, fields(url = %url))]
pub fn fetch_text(url: &str) -> Result<String, Error> {
    let response = {
        let _span = info_span!("site_fetch").entered();
        ureq::get(url).header("User-Agent", USER_AGENT).call()?
    };

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(Error::Status {
            status,
            url: url.to_string(),
        });
    }

    let body = response.into_body().read_to_string()?;
    info!(bytes = body.len(), "fetched page");
    Ok(body)
}
