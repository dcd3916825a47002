use std::fs;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use tlg_ledger::{
    ChainReport, Ledger, LedgerConfig, NewAttestation, NewRecord, ThreadDetails, ThreadSpec,
};
use tlg_store::{InMemoryStore, SnapshotFile};
use tlg_types::{
    Actor, ChangeType, ContentHash, IntegrityLogEntry, LedgerThread, ModulePayload, Payload,
    PortfolioId, RecordId, TrustId,
};
use tracing::debug;

use crate::cli::*;

/// One CLI invocation: a ledger loaded from the state file plus the caller.
struct Session {
    ledger: Ledger,
    store: Arc<InMemoryStore>,
    file: SnapshotFile,
    actor: Actor,
    portfolio: PortfolioId,
    trust: TrustId,
    format: OutputFormat,
}

impl Session {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => LedgerConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => LedgerConfig::default(),
        };
        let file = SnapshotFile::new(&cli.state);
        let store = Arc::new(
            file.load()
                .with_context(|| format!("loading state {}", cli.state.display()))?,
        );
        let ledger = Ledger::new(store.clone(), config)?;

        let mut actor = Actor::new(cli.actor.as_str());
        if let Some(user) = &cli.acting_as {
            actor = actor.acting_as(user.as_str());
        }
        if let Some(ip) = &cli.ip {
            actor = actor.with_ip(ip.as_str());
        }
        debug!(state = %cli.state.display(), actor = %actor.user_id, "session opened");

        Ok(Self {
            ledger,
            store,
            file,
            actor,
            portfolio: PortfolioId::new(cli.portfolio.as_str()),
            trust: TrustId::new(cli.trust.as_str()),
            format: cli.format,
        })
    }

    fn save(&self) -> anyhow::Result<()> {
        self.file
            .save(&self.store)
            .with_context(|| format!("saving state {}", self.file.path().display()))
    }

    /// Accept a record id or any display id the record has carried.
    fn record_id(&self, reference: &str) -> anyhow::Result<RecordId> {
        if let Ok(id) = reference.parse::<RecordId>() {
            return Ok(id);
        }
        Ok(self.ledger.resolve_display_id(reference)?.record.id)
    }

    fn record_ids(&self, references: &[String]) -> anyhow::Result<Vec<RecordId>> {
        references.iter().map(|r| self.record_id(r)).collect()
    }

    /// Print `value` as JSON, or run `text` in text mode.
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(value),
        }
        Ok(())
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let session = Session::open(&cli)?;
    let mutated = is_mutation(&cli.command);
    let outcome = dispatch(&session, cli.command);
    // Transitions that committed before a later failure are kept.
    if mutated {
        session.save()?;
    }
    outcome
}

fn is_mutation(command: &Command) -> bool {
    matches!(
        command,
        Command::RegisterBase(_)
            | Command::CreateThread(_)
            | Command::AllocateSub(_)
            | Command::CreateRecord(_)
            | Command::UpdateDraft(_)
            | Command::Finalize(_)
            | Command::FinalizeAmendment(_)
            | Command::Amend(_)
            | Command::Void(_)
            | Command::Attest(_)
            | Command::Merge(_)
            | Command::Split(_)
            | Command::Reassign(_)
    )
}

fn dispatch(s: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::RegisterBase(args) => cmd_register_base(s, args),
        Command::CreateThread(args) => cmd_create_thread(s, args),
        Command::AllocateSub(args) => cmd_allocate_sub(s, args),
        Command::CreateRecord(args) => cmd_create_record(s, args),
        Command::UpdateDraft(args) => cmd_update_draft(s, args),
        Command::Finalize(args) => cmd_finalize(s, args, false),
        Command::FinalizeAmendment(args) => cmd_finalize(s, args, true),
        Command::Amend(args) => cmd_amend(s, args),
        Command::Void(args) => cmd_void(s, args),
        Command::History(args) => cmd_history(s, args),
        Command::Diff(args) => cmd_diff(s, args),
        Command::Events(args) => cmd_events(s, args),
        Command::Attest(args) => cmd_attest(s, args),
        Command::Attestations(args) => cmd_attestations(s, args),
        Command::Verify(args) => cmd_verify(s, args),
        Command::VerifyRevision(args) => cmd_verify_revision(s, args),
        Command::Resolve(args) => cmd_resolve(s, args),
        Command::Thread(args) => {
            let thread = s.ledger.thread(&args.thread)?;
            s.emit(&thread, print_thread)
        }
        Command::Threads(args) => {
            let threads = s.ledger.threads(&s.portfolio, args.include_deleted)?;
            s.emit(&threads, |threads| {
                if threads.is_empty() {
                    println!("No threads.");
                }
                threads.iter().for_each(print_thread);
            })
        }
        Command::Record(args) => {
            let record = s.ledger.record(&s.record_id(&args.record)?)?;
            s.emit(&record, |r| {
                println!(
                    "{}  {}  [{}]",
                    r.display_id.to_string().yellow().bold(),
                    r.title,
                    r.status
                );
                println!("  Record: {}", r.id.to_string().dimmed());
                println!("  Module: {}", r.module_type);
                println!("  Current revision: {}", r.current_revision_id);
                for moved in &r.merge_history {
                    println!(
                        "  {} {} -> {} ({})",
                        moved.operation.to_string().cyan(),
                        moved.from_display_id,
                        moved.to_display_id,
                        moved.reason
                    );
                }
            })
        }
        Command::Records(args) => {
            let records = s.ledger.records_in_thread(&args.thread)?;
            s.emit(&records, |records| {
                if records.is_empty() {
                    println!("No records.");
                }
                for r in records {
                    println!("{}  {}  [{}]", r.display_id.to_string().yellow(), r.title, r.status);
                }
            })
        }
        Command::Merge(args) => cmd_merge(s, args),
        Command::Split(args) => cmd_split(s, args),
        Command::Reassign(args) => cmd_reassign(s, args),
        Command::IntegrityLog => {
            let entries = s.ledger.integrity_log(&s.portfolio)?;
            s.emit(&entries, |entries| {
                if entries.is_empty() {
                    println!("No maintenance runs.");
                }
                entries.iter().for_each(print_integrity_entry);
            })
        }
    }
}

fn read_payload(args: &PayloadArgs) -> anyhow::Result<Payload> {
    let raw = match (&args.payload, &args.payload_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("reading payload {}", path.display()))?,
        (None, None) => anyhow::bail!("a payload is required (--payload or --payload-file)"),
    };
    Ok(Payload::from_json_str(&raw)?)
}

fn cmd_register_base(s: &Session, args: RegisterBaseArgs) -> anyhow::Result<()> {
    let base = s.ledger.register_base(&s.actor, &s.portfolio, &args.base)?;
    s.emit(&base, |base| {
        println!(
            "{} Base {} registered for {}",
            "✓".green().bold(),
            base.to_string().bold(),
            s.portfolio
        );
    })
}

fn cmd_create_thread(s: &Session, args: CreateThreadArgs) -> anyhow::Result<()> {
    let details = ThreadDetails {
        title: args.title,
        category: args.category,
        primary_party: args.party,
        external_ref: args.external_ref,
    };
    let created = s.ledger.create_thread(&s.actor, &s.portfolio, &s.trust, details)?;
    s.emit(&created, |c| {
        println!("{} Thread {} opened", "✓".green().bold(), c.display_id_prefix.yellow().bold());
        println!("  Thread: {}", c.thread_id.to_string().dimmed());
    })
}

fn cmd_allocate_sub(s: &Session, args: ThreadArgs) -> anyhow::Result<()> {
    let issued = s.ledger.allocate_sub(&s.actor, &args.thread)?;
    s.emit(&issued, |a| {
        println!("{} Reserved {}", "✓".green().bold(), a.display_id.to_string().yellow().bold());
    })
}

fn cmd_create_record(s: &Session, args: CreateRecordArgs) -> anyhow::Result<()> {
    let payload = read_payload(&args.payload)?;
    let title = match args.title {
        Some(title) => title,
        None => ModulePayload::parse(args.module, &payload)?.title().to_string(),
    };
    let thread = match (args.thread, args.reserved_sub, args.new_thread) {
        (Some(thread_id), Some(sub), _) => ThreadSpec::Reserved { thread_id, sub },
        (Some(thread_id), None, _) => ThreadSpec::Existing(thread_id),
        (None, _, Some(title)) => ThreadSpec::New(ThreadDetails::new(title, args.category)),
        (None, _, None) => anyhow::bail!("choose a thread with --thread or --new-thread"),
    };

    let created = s.ledger.create_record(
        &s.actor,
        NewRecord {
            portfolio_id: s.portfolio.clone(),
            trust_id: s.trust.clone(),
            module_type: args.module,
            title,
            payload,
            thread,
        },
    )?;
    s.emit(&created, |c| {
        println!(
            "{} Record {} filed as draft",
            "✓".green().bold(),
            c.display_id.to_string().yellow().bold()
        );
        println!("  Record: {}", c.record_id.to_string().dimmed());
        println!("  Revision: {}", c.revision_id.to_string().dimmed());
    })
}

fn cmd_update_draft(s: &Session, args: UpdateDraftArgs) -> anyhow::Result<()> {
    let payload = read_payload(&args.payload)?;
    let revision = s.ledger.update_draft(&s.actor, &args.revision, payload)?;
    s.emit(&revision, |r| {
        println!("{} Draft v{} updated (edit {})", "✓".green().bold(), r.version, r.draft_seq);
    })
}

fn cmd_finalize(s: &Session, args: RevisionArgs, amendment: bool) -> anyhow::Result<()> {
    let sealed = if amendment {
        s.ledger.finalize_amendment(&s.actor, &args.revision)?
    } else {
        s.ledger.finalize(&s.actor, &args.revision)?
    };
    s.emit(&sealed, |f| {
        println!("{} Version {} finalized", "✓".green().bold(), f.version);
        println!("  Hash: {}", f.content_hash.to_hex().cyan());
    })
}

fn cmd_amend(s: &Session, args: AmendArgs) -> anyhow::Result<()> {
    let record_id = s.record_id(&args.record)?;
    let change_type = if args.correction {
        ChangeType::Correction
    } else {
        ChangeType::Amendment
    };
    let amended = s.ledger.amend_as(&s.actor, &record_id, &args.reason, change_type)?;
    s.emit(&amended, |a| {
        println!("{} Opened v{} ({})", "✓".green().bold(), a.version, change_type);
        println!("  Revision: {}", a.new_revision_id.to_string().dimmed());
        println!("  Parent hash: {}", a.parent_hash.short_hex().cyan());
    })
}

fn cmd_void(s: &Session, args: VoidArgs) -> anyhow::Result<()> {
    let record_id = s.record_id(&args.record)?;
    let voided = s.ledger.void(&s.actor, &record_id, &args.reason)?;
    s.emit(&voided, |v| {
        println!("{} Record voided at {}", "✓".green().bold(), v.voided_at.to_rfc3339());
    })
}

fn cmd_history(s: &Session, args: RecordArgs) -> anyhow::Result<()> {
    let history = s.ledger.history(&s.record_id(&args.record)?)?;
    s.emit(&history, |history| {
        for r in history {
            let hash = r
                .content_hash
                .as_ref()
                .map(ContentHash::short_hex)
                .unwrap_or_else(|| "draft".into());
            println!(
                "{}  {}  {}  {}",
                format!("v{}", r.version).yellow().bold(),
                r.change_type,
                hash.cyan(),
                r.change_reason.as_deref().unwrap_or("")
            );
        }
    })
}

fn cmd_diff(s: &Session, args: DiffArgs) -> anyhow::Result<()> {
    let diff = s.ledger.diff(&args.revision, args.against.as_ref())?;
    s.emit(&diff, |d| {
        let from = d.from_version.map_or("empty".to_string(), |v| format!("v{v}"));
        println!("{} -> v{}", from, d.to_version);
        if d.changes.is_empty() {
            println!("No changes.");
        }
        for change in &d.changes.changes {
            match serde_json::to_string(change) {
                Ok(line) => println!("  {}", line),
                Err(_) => println!("  {}", change.path()),
            }
        }
    })
}

fn cmd_events(s: &Session, args: RecordArgs) -> anyhow::Result<()> {
    let events = s.ledger.events(&s.record_id(&args.record)?)?;
    s.emit(&events, |events| {
        for e in events {
            let on_behalf = e
                .acting_as_user_id
                .as_ref()
                .map(|u| format!(" for {u}"))
                .unwrap_or_default();
            println!(
                "{}  {}  {}{}",
                e.at.to_rfc3339().dimmed(),
                e.event_type.to_string().green(),
                e.actor_id,
                on_behalf
            );
        }
    })
}

fn cmd_attest(s: &Session, args: AttestArgs) -> anyhow::Result<()> {
    let attestation = s.ledger.attest(
        &s.actor,
        NewAttestation {
            revision_id: args.revision,
            signer_name: args.signer_name,
            role: args.role,
            signature_type: args.signature_type,
            text: args.text,
        },
    )?;
    s.emit(&attestation, |a| {
        println!("{} Attested by {} ({})", "✓".green().bold(), a.signer_name.bold(), a.role);
    })
}

fn cmd_attestations(s: &Session, args: RecordArgs) -> anyhow::Result<()> {
    let attestations = s.ledger.attestations(&s.record_id(&args.record)?)?;
    s.emit(&attestations, |list| {
        if list.is_empty() {
            println!("No attestations.");
        }
        for a in list {
            println!(
                "{}  {} ({}, {})  {}",
                a.signed_at.to_rfc3339().dimmed(),
                a.signer_name.bold(),
                a.role,
                a.signature_type,
                a.text
            );
        }
    })
}

fn cmd_verify(s: &Session, args: RecordArgs) -> anyhow::Result<()> {
    let report = s.ledger.verify_record(&s.record_id(&args.record)?)?;
    s.emit(&report, print_report)?;
    Ok(report.ensure_intact()?)
}

fn print_report(report: &ChainReport) {
    if report.is_intact() {
        println!(
            "{} {} chain intact ({} versions, {} finalized)",
            "✓".green().bold(),
            report.display_id.to_string().yellow(),
            report.versions,
            report.finalized
        );
        return;
    }
    println!("{} {} chain broken", "✗".red().bold(), report.display_id.to_string().yellow());
    for v in &report.violations {
        let at = v.version.map(|n| format!("v{n}")).unwrap_or_default();
        println!("  {} {}", at.red(), v.message);
    }
}

fn cmd_verify_revision(s: &Session, args: RevisionArgs) -> anyhow::Result<()> {
    let check = s.ledger.verify_revision(&args.revision)?;
    s.emit(&check, |c| {
        let mark = if c.intact { "✓".green().bold() } else { "✗".red().bold() };
        println!("{} v{} of {}", mark, c.version, c.record_id);
        println!("  Stored:     {}", ContentHash::hex_or_empty(c.stored_hash.as_ref()));
        println!("  Recomputed: {}", c.recomputed_hash.to_hex());
    })
}

fn cmd_resolve(s: &Session, args: ResolveArgs) -> anyhow::Result<()> {
    let resolved = s.ledger.resolve_display_id(&args.display_id)?;
    s.emit(&resolved, |r| {
        if r.current {
            println!("{} {}", r.record.display_id.to_string().yellow().bold(), r.record.title);
        } else {
            println!(
                "{} now filed as {}  {}",
                args.display_id.dimmed(),
                r.record.display_id.to_string().yellow().bold(),
                r.record.title
            );
        }
    })
}

fn cmd_merge(s: &Session, args: MergeArgs) -> anyhow::Result<()> {
    let outcome = s.ledger.merge(&s.actor, &args.target, &args.sources, &args.reason)?;
    s.emit(&outcome, |o| {
        print_integrity_entry(&o.entry);
        for id in &o.deleted_threads {
            println!("  {} {}", "deleted".dimmed(), id);
        }
    })
}

fn cmd_split(s: &Session, args: SplitArgs) -> anyhow::Result<()> {
    let records = s.record_ids(&args.records)?;
    let outcome = s
        .ledger
        .split(&s.actor, &args.source, &records, &args.title, &args.reason)?;
    s.emit(&outcome, |o| {
        println!(
            "{} New thread {}",
            "✓".green().bold(),
            o.thread.prefix().to_string().yellow().bold()
        );
        print_integrity_entry(&o.entry);
    })
}

fn cmd_reassign(s: &Session, args: ReassignArgs) -> anyhow::Result<()> {
    let records = s.record_ids(&args.records)?;
    let entry = s.ledger.reassign(&s.actor, &records, &args.target, &args.reason)?;
    s.emit(&entry, print_integrity_entry)
}

fn print_thread(t: &LedgerThread) {
    let deleted = if t.is_deleted() { " (deleted)".red().to_string() } else { String::new() };
    println!(
        "{}  {}  [{}]  {} issued{}",
        t.prefix().to_string().yellow().bold(),
        t.title,
        t.category,
        t.issued(),
        deleted
    );
}

fn print_integrity_entry(e: &IntegrityLogEntry) {
    println!(
        "{} {}  {} moved, {} failed  ({})",
        e.at.to_rfc3339().dimmed(),
        e.operation.to_string().cyan().bold(),
        e.moves.len(),
        e.failures.len(),
        e.reason
    );
    for m in &e.moves {
        println!("  {} -> {}", m.before, m.after.to_string().green());
    }
    for f in &e.failures {
        println!("  {} {} {}", "✗".red(), f.code.red(), f.message);
    }
}
