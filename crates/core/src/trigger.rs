use anyhow::Context;

use crate::agenda::Agenda;

/// Resolve a cue's human-friendly name to its server ID via the served agenda.
pub async fn find_cue_id(
    client: &reqwest::Client,
    base_url: &str,
    cue_name: &str,
) -> anyhow::Result<String> {
    let agenda = Agenda::fetch(client, base_url).await?;
    agenda
        .cue_id(cue_name)
        .map(|id| id.to_string())
        .with_context(|| format!("cue {} not found in agenda", cue_name))
}

/// Fire a cue on the performance server. Fire-and-forget: the server
/// broadcasts the resulting timeline change over the performance time feed,
/// so no response body is consumed.
pub async fn trigger_cue(
    client: &reqwest::Client,
    base_url: &str,
    cue_id: &str,
) -> anyhow::Result<()> {
    let url = format!("{}/cues/{}", base_url.trim_end_matches('/'), cue_id);
    client
        .put(&url)
        .send()
        .await
        .context("failed to trigger cue")?
        .error_for_status()
        .context("cue trigger rejected")?;
    Ok(())
}
