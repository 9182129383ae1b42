use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Args;
use notice_desk::config::AppConfig;
use notice_desk::error::AppError;
use notice_desk::notices::{
    Audience, CallerIdentity, ManualClock, ModerationDecision, Notice, NoticeDetails,
    NoticeFilter, NoticeStatus, NoticeSubmission, OwnerId, PublicScope, QueryRequest,
};

use crate::infra::{build_notice_api, parse_scope, MemoryNoticeApi};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Optional CSV backlog replayed before the sample notices.
    #[arg(long)]
    pub(crate) seed_csv: Option<PathBuf>,
    /// Filter the public listing by name, reference, type, or newspaper.
    #[arg(long)]
    pub(crate) search: Option<String>,
    /// Public listing scope: `confirmed` (default) or `published`.
    #[arg(long, value_parser = parse_scope)]
    pub(crate) scope: Option<PublicScope>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        seed_csv,
        search,
        scope,
    } = args;

    let config = AppConfig::load()?;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let api = build_notice_api(&config, clock.clone(), seed_csv.as_deref())?;
    let editor = CallerIdentity::moderator("demo-editor");
    let scope = scope.unwrap_or_default();

    println!("Notice desk demo");
    let samples = sample_submissions();
    let mut submitted = Vec::with_capacity(samples.len());
    for (owner, submission) in samples {
        let notice = api
            .lifecycle
            .submit(OwnerId(owner.to_string()), submission)?;
        println!(
            "- {} submitted {} ({}) -> {}",
            owner,
            notice.reference_id,
            notice.notice_type(),
            notice.status
        );
        submitted.push(notice);
    }

    let pending = api.lifecycle.list_all(
        &editor,
        NoticeFilter {
            status: Some(NoticeStatus::Pending),
            ..NoticeFilter::default()
        },
        1,
        50,
    )?;
    println!("\nModeration queue: {} pending", pending.total);

    // Approve and pay the first two, reject the third.
    for (index, notice) in submitted.iter().enumerate() {
        let decision = if index < 2 {
            ModerationDecision::Approve
        } else {
            ModerationDecision::Reject
        };
        let moderated = api.lifecycle.moderate(&editor, &notice.id, decision)?;
        println!(
            "- {} {} | publish {}",
            moderated.reference_id,
            moderated.status,
            describe_schedule(&moderated)
        );
    }
    for notice in submitted.iter().take(2) {
        let outcome = api.lifecycle.confirm_payment(&notice.reference_id)?;
        println!(
            "- payment recorded for {} (paid: {})",
            outcome.notice.reference_id, outcome.notice.paid
        );
    }

    print_listing(&api, scope, search.as_deref(), "today")?;

    let grace = Duration::days(i64::from(config.publication.grace_period_days));
    clock.advance(grace);
    print_listing(
        &api,
        scope,
        search.as_deref(),
        &format!("after {} days", grace.num_days()),
    )?;

    let owner = &submitted[0].owner_id;
    let mine = api.lifecycle.list_owned(owner, 1, 20)?;
    println!("\n{} has {} notice(s) on file", owner, mine.total);

    let stats = api.lifecycle.stats()?;
    println!(
        "\nTotals: {} notices | {} pending | {} approved | {} rejected | {} paid | {} published",
        stats.total, stats.pending, stats.approved, stats.rejected, stats.paid, stats.published
    );

    Ok(())
}

fn print_listing(
    api: &MemoryNoticeApi,
    scope: PublicScope,
    search: Option<&str>,
    label: &str,
) -> Result<(), AppError> {
    let mut request = QueryRequest::page(1, 30);
    if let Some(term) = search {
        request = request.search(term);
    }
    let page = api.queries.query(None, Audience::Public(scope), request)?;

    println!("\nPublic listing ({scope:?}, {label}): {} match(es)", page.total);
    for notice in page.data.iter().map(Notice::public_view) {
        println!(
            "  - {} [{}] {} | {}",
            notice.reference_id,
            notice.notice_type,
            notice.newspaper.as_deref().unwrap_or("any newspaper"),
            notice.content
        );
    }
    Ok(())
}

fn describe_schedule(notice: &Notice) -> String {
    notice
        .publish_at
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "not scheduled".to_string())
}

fn sample_submissions() -> Vec<(&'static str, NoticeSubmission)> {
    vec![
        (
            "owner-ada",
            NoticeSubmission {
                details: NoticeDetails::ChangeOfName {
                    old_name: "Adaeze Okafor".to_string(),
                    new_name: "Adaeze Bello".to_string(),
                },
                price: None,
                newspaper: Some("The Guardian".to_string()),
            },
        ),
        (
            "owner-tunde",
            NoticeSubmission {
                details: NoticeDetails::LostDocument {
                    doc_type: "International passport".to_string(),
                    description: "Lost between Ikeja and Yaba on the evening of the 3rd."
                        .to_string(),
                },
                price: None,
                newspaper: None,
            },
        ),
        (
            "owner-kemi",
            NoticeSubmission {
                details: NoticeDetails::CourtAffidavit {
                    full_name: "Oluwakemi Ade".to_string(),
                    purpose: "confirm the spelling of her surname".to_string(),
                },
                price: Some(10_000),
                newspaper: Some("Punch".to_string()),
            },
        ),
    ]
}
