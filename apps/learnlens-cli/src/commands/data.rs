use anyhow::Result;
use learnlens_auth::Session;

use super::print_json;
use crate::services;

fn require_login(session: &Session) -> Result<()> {
    if session.is_authenticated() {
        Ok(())
    } else {
        anyhow::bail!("not logged in; run `learnlens login` first")
    }
}

pub(super) async fn dashboard(session: &Session) -> Result<()> {
    require_login(session)?;
    print_json(&services::fetch_dashboard(session.api()).await?)
}

pub(super) async fn insights(session: &Session) -> Result<()> {
    require_login(session)?;
    print_json(&services::fetch_insights(session.api()).await?)
}

pub(super) async fn courses(session: &Session) -> Result<()> {
    require_login(session)?;
    print_json(&services::fetch_courses(session.api()).await?)
}
