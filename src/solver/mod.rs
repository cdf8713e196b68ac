//! The backtracking constraint solver: the async driver that turns a root package
//! tree and a [`RootManifest`] into a [`Lock`], fetching candidate versions and manifests
//! through a [`SourceManager`] and backtracking on conflict.
//!
//! The pure, synchronous pieces — candidate matching, reach computation, the selection
//! stack's frame shape — live in [`state`] and are unit-tested in isolation; this module
//! is the loop that drives them against real I/O.

mod state;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::analyzer::{self, flatten_external_from_buildable_sources, is_probably_stdlib, IgnoreRules};
use crate::core::error::{Cancelled, ResolverError, Result};
use crate::core::plugin::Analyzer;
use crate::core::project::ProjectId;
use crate::lockfile::{Lock, LockedProject};
use crate::manifest::{Manifest, RootManifest};
use crate::source::{sort_candidates, CandidateVersion, SourceManager, SourceRef};
use crate::version::Constraint;

use state::{candidate_matches, demand_by_root, reached_packages, Committed, Contribution, Frame, PendingAtom, ResumeState};

/// Everything the solver needs that isn't already owned by the [`SourceManager`] or
/// [`Analyzer`] it's handed: the root tree location, the root manifest, and the knobs
/// that change candidate selection without changing the algorithm itself.
pub struct SolverInput<'a> {
    /// Filesystem root of the project under resolution.
    pub root_dir: &'a Path,
    /// The import path the root tree is rooted at.
    pub root_import_path: &'a str,
    /// The root's declared dependencies, overrides, ignores, and required packages.
    pub root_manifest: &'a RootManifest,
    /// A previously-produced lock, consulted for version preference unless a project is
    /// named in `force_update`.
    pub existing_lock: Option<&'a Lock>,
    /// Reverses candidate ordering (oldest-first) for every project.
    pub downgrade: bool,
    /// Projects whose lock entry (if any) should be ignored, forcing a fresh search.
    pub force_update: &'a BTreeSet<String>,
}

/// Runs the backtracking solver to completion, producing a [`Lock`] or propagating
/// whichever [`ResolverError`] first made resolution impossible to continue (as distinct
/// from a mere conflict, which the algorithm backtracks around). A `Cancelled` result
/// means the caller's token fired mid-resolution; nothing is committed to disk by this
/// function either way.
pub async fn resolve(
    source_manager: &SourceManager,
    analyzer: &dyn Analyzer,
    input: SolverInput<'_>,
    cancel: &CancellationToken,
) -> Result<std::result::Result<Lock, Cancelled>> {
    let mut solver = Solver::new(source_manager, analyzer, input, cancel);
    solver.initialize()?;
    solver.run().await
}

struct Solver<'a> {
    source_manager: &'a SourceManager,
    analyzer: &'a dyn Analyzer,
    root_manifest: &'a RootManifest,
    existing_lock: Option<&'a Lock>,
    downgrade: bool,
    force_update: &'a BTreeSet<String>,
    cancel: &'a CancellationToken,

    root_dir: &'a Path,
    root_import_path: &'a str,

    queue: VecDeque<PendingAtom>,
    queued_roots: BTreeSet<String>,
    contributions: BTreeMap<String, Vec<Contribution>>,
    known_roots: BTreeSet<String>,
    stack: Vec<Frame>,
    selections: BTreeMap<String, usize>,
    failures: BTreeMap<String, Vec<String>>,
    root_input_imports: Vec<String>,
}

impl<'a> Solver<'a> {
    fn new(source_manager: &'a SourceManager, analyzer: &'a dyn Analyzer, input: SolverInput<'a>, cancel: &'a CancellationToken) -> Self {
        Self {
            source_manager,
            analyzer,
            root_manifest: input.root_manifest,
            existing_lock: input.existing_lock,
            downgrade: input.downgrade,
            force_update: input.force_update,
            cancel,
            root_dir: input.root_dir,
            root_import_path: input.root_import_path,
            queue: VecDeque::new(),
            queued_roots: BTreeSet::new(),
            contributions: BTreeMap::new(),
            known_roots: BTreeSet::new(),
            stack: Vec::new(),
            selections: BTreeMap::new(),
            failures: BTreeMap::new(),
            root_input_imports: Vec::new(),
        }
    }

    /// Lists the root's packages, computes its external reach under the
    /// root manifest's ignore/require sets, and seed the queue with its required
    /// projects (plus every overridden root, even ones nothing imports).
    fn initialize(&mut self) -> Result<()> {
        let tree = analyzer::walk(self.root_dir, self.root_import_path);
        let ignore = IgnoreRules::new(self.root_manifest.ignored.iter().cloned().collect::<Vec<_>>());
        let reach = analyzer::reach::compute(&tree, &ignore, false);

        let mut external: BTreeSet<String> = flatten_external_from_buildable_sources(&reach, is_probably_stdlib).into_iter().collect();
        for required in &self.root_manifest.required {
            if let Some(r) = reach.entries.get(required) {
                external.extend(r.external.iter().filter(|e| !is_probably_stdlib(e)).cloned());
            }
        }
        self.root_input_imports = external.iter().cloned().collect();

        self.known_roots = self.root_manifest.manifest.dependencies.keys().cloned().collect();
        self.known_roots.extend(self.root_manifest.overrides.keys().cloned());

        // The root's own declarations always contribute, independent of whether the
        // bimodal reach step above actually demands every one of them: they are direct,
        // deliberate statements about the root project, not inferred transitive demand.
        for (root, dep) in &self.root_manifest.manifest.dependencies {
            self.contribute(root, dep.constraint.clone());
        }

        let demand_map = demand_by_root(&self.root_input_imports, &self.known_roots);
        for (root, demanded) in demand_map {
            let source_override = self.root_manifest.effective(&root).and_then(|d| d.source.clone());
            self.enqueue_demand(root, source_override, demanded);
        }

        for root in self.root_manifest.overrides.keys().cloned().collect::<Vec<_>>() {
            if !self.queued_roots.contains(&root) {
                let source_override = self.root_manifest.overrides.get(&root).and_then(|d| d.source.clone());
                self.enqueue_demand(root, source_override, BTreeSet::new());
            }
        }

        Ok(())
    }

    /// Drains the queue, building and trying candidate frames,
    /// backtracking on exhaustion, until the queue empties (success) or the stack itself
    /// is exhausted (failure).
    async fn run(&mut self) -> Result<std::result::Result<Lock, Cancelled>> {
        loop {
            let Some(atom) = self.queue.pop_front() else {
                return Ok(Ok(self.assemble_lock()));
            };
            self.queued_roots.remove(&atom.root);

            if let Some(&idx) = self.selections.get(&atom.root) {
                self.grow_demand(idx, atom)?;
                continue;
            }

            let mut frame = match self.build_frame(atom).await? {
                Ok(frame) => frame,
                Err(Cancelled) => return Ok(Err(Cancelled)),
            };

            match self.try_candidates(&mut frame).await? {
                Err(Cancelled) => return Ok(Err(Cancelled)),
                Ok(true) => {
                    let idx = self.stack.len();
                    self.selections.insert(frame.root.clone(), idx);
                    self.stack.push(frame);
                }
                Ok(false) => {
                    self.failures.entry(frame.root.clone()).or_default().push(format!("no version satisfied `{}`", frame.constraint));
                    match self.backtrack().await? {
                        Err(Cancelled) => return Ok(Err(Cancelled)),
                        Ok(true) => {}
                        Ok(false) => return Err(ResolverError::ResolutionFailed { explanation: self.explain() }),
                    }
                }
            }
        }
    }

    /// Handles demand arriving for a project already on the selection stack: the demand
    /// can only grow (never shrink or change version), so this recomputes reach against
    /// the already-committed tree and propagates any newly-reached external imports.
    fn grow_demand(&mut self, idx: usize, atom: PendingAtom) -> Result<()> {
        let new_total: BTreeSet<String> = self.stack[idx].demanded.union(&atom.demanded).cloned().collect();
        if new_total == self.stack[idx].demanded {
            return Ok(());
        }
        self.stack[idx].demanded = new_total;

        let root = self.stack[idx].root.clone();
        let demanded = self.stack[idx].demanded.clone();
        let (tree, manifest) = {
            let committed = self.stack[idx].committed.as_ref().expect("selections only indexes committed frames");
            (committed.tree.clone(), committed.manifest.clone())
        };
        let (_internal, external) = reached_packages(&tree, &demanded)?;
        let external: Vec<String> = external.into_iter().collect();
        self.propagate_demand(&root, &manifest, &external);
        Ok(())
    }

    /// Computes the effective constraint, deduces the source, and
    /// lists (or resumes) the candidate version queue for a brand-new atom.
    async fn build_frame(&self, atom: PendingAtom) -> Result<std::result::Result<Frame, Cancelled>> {
        let constraint = self.effective_constraint(&atom.root);
        let source = self.resolve_source(&atom.root, atom.source_override.as_deref()).await?;

        let (all_candidates, cursor, blacklist) = match atom.resume {
            Some(resume) => (resume.all_candidates, resume.cursor, resume.blacklist),
            None => {
                let mut candidates = match self.source_manager.list_versions(&source, self.cancel).await? {
                    Ok(candidates) => candidates,
                    Err(Cancelled) => return Ok(Err(Cancelled)),
                };
                sort_candidates(&mut candidates, self.downgrade);
                self.prefer_locked(&atom.root, &mut candidates);
                (candidates, 0, BTreeSet::new())
            }
        };

        Ok(Ok(Frame {
            root: atom.root,
            source_override: atom.source_override,
            source,
            demanded: atom.demanded,
            constraint,
            all_candidates,
            cursor,
            blacklist,
            committed: None,
            queue_snapshot: self.queue.clone(),
            queued_roots_snapshot: self.queued_roots.clone(),
            contributions_snapshot: self.contributions.clone(),
        }))
    }

    /// Moves the lock's preferred candidate for `root` to the front of `candidates`,
    /// unless `root` is named in `force_update` — move lock-preferred versions
    /// to the front (unless force-update applies)".
    fn prefer_locked(&self, root: &str, candidates: &mut Vec<CandidateVersion>) {
        if self.force_update.contains(root) {
            return;
        }
        let Some(locked) = self.existing_lock.and_then(|l| l.project(root)) else {
            return;
        };
        if let Some(pos) = candidates.iter().position(|c| c.version == locked.version || locked.version.matches_revision(&c.revision)) {
            let preferred = candidates.remove(pos);
            candidates.insert(0, preferred);
        }
    }

    /// Tries each candidate from `frame.cursor` onward, committing the
    /// first one whose manifest, packages, and reach all succeed; returns `false` once
    /// every remaining candidate has been tried or ruled out.
    async fn try_candidates(&mut self, frame: &mut Frame) -> Result<std::result::Result<bool, Cancelled>> {
        while frame.cursor < frame.all_candidates.len() {
            let candidate = frame.all_candidates[frame.cursor].clone();
            frame.cursor += 1;

            if frame.blacklist.contains(&candidate.revision) {
                continue;
            }
            if !candidate_matches(&frame.constraint, &candidate.version) {
                continue;
            }

            tracing::debug!(target: "solver", project = %frame.root, version = %candidate.version, "attempting candidate");
            match self.try_one_candidate(&frame.source, &frame.root, &candidate, &frame.demanded).await? {
                Err(Cancelled) => return Ok(Err(Cancelled)),
                Ok(Some(committed)) => {
                    frame.committed = Some(committed);
                    self.after_commit(frame)?;
                    return Ok(Ok(true));
                }
                Ok(None) => {
                    frame.blacklist.insert(candidate.revision.clone());
                    continue;
                }
            }
        }
        tracing::debug!(target: "solver", project = %frame.root, "candidate queue exhausted");
        Ok(Ok(false))
    }

    /// Fetches one candidate's packages and manifest and computes its reach. A
    /// cache-recoverable error (corrupt cache, missing revision) disqualifies just
    /// this candidate; any other source-manager error, and an analyzer error, also
    /// disqualifies the candidate, since "analyzer errors during a trial disqualify the
    /// candidate rather than being fatal" — only whole-source inaccessibility is allowed
    /// to propagate, and that distinction is exactly what `is_cache_recoverable` inverts.
    async fn try_one_candidate(
        &self,
        source: &SourceRef,
        root: &str,
        candidate: &CandidateVersion,
        demanded: &BTreeSet<String>,
    ) -> Result<std::result::Result<Option<Committed>, Cancelled>> {
        let tree = match self.source_manager.list_packages(source, &candidate.version, root, self.cancel).await {
            Ok(Ok(tree)) => tree,
            Ok(Err(Cancelled)) => return Ok(Err(Cancelled)),
            Err(e) if e.is_cache_recoverable() => {
                tracing::warn!(target: "solver", project = root, version = %candidate.version, error = %e, "candidate disqualified");
                return Ok(Ok(None));
            }
            Err(e) => return Err(e),
        };

        let manifest = match self.source_manager.get_manifest_and_lock(source, &candidate.version, root, self.analyzer, self.cancel).await {
            Ok(Ok((manifest, _lock))) => manifest,
            Ok(Err(Cancelled)) => return Ok(Err(Cancelled)),
            Err(e) if e.is_cache_recoverable() => {
                tracing::warn!(target: "solver", project = root, version = %candidate.version, error = %e, "candidate disqualified");
                return Ok(Ok(None));
            }
            Err(e) => return Err(e),
        };

        match reached_packages(&tree, demanded) {
            Ok((internal, _external)) => Ok(Ok(Some(Committed { version: candidate.version.clone(), revision: candidate.revision.clone(), manifest, tree, packages: internal }))),
            Err(e) => {
                tracing::warn!(target: "solver", project = root, version = %candidate.version, error = %e, "candidate disqualified by analyzer conflict");
                Ok(Ok(None))
            }
        }
    }

    /// Pops the most recently committed frame, restores solver state to
    /// the moment before it was created, and resumes its candidate search from exactly
    /// where it left off via [`ResumeState`] — never re-listing versions over the
    /// network and never re-offering a candidate already ruled out. Keeps popping
    /// further back whenever a popped frame's remaining candidates are also exhausted.
    async fn backtrack(&mut self) -> Result<std::result::Result<bool, Cancelled>> {
        while let Some(frame) = self.stack.pop() {
            self.selections.remove(&frame.root);
            self.queue = frame.queue_snapshot.clone();
            self.queued_roots = frame.queued_roots_snapshot.clone();
            self.contributions = frame.contributions_snapshot.clone();

            let Frame { root, source_override, demanded, all_candidates, cursor, mut blacklist, committed, .. } = frame;
            if let Some(committed) = committed {
                self.failures.entry(root.clone()).or_default().push(format!("backtracked past {}", committed.version));
                blacklist.insert(committed.revision);
            }

            let resume = PendingAtom { root, source_override, demanded, resume: Some(ResumeState { all_candidates, cursor, blacklist }) };
            let mut resumed = match self.build_frame(resume).await? {
                Ok(frame) => frame,
                Err(Cancelled) => return Ok(Err(Cancelled)),
            };

            match self.try_candidates(&mut resumed).await? {
                Err(Cancelled) => return Ok(Err(Cancelled)),
                Ok(true) => {
                    let idx = self.stack.len();
                    self.selections.insert(resumed.root.clone(), idx);
                    self.stack.push(resumed);
                    return Ok(Ok(true));
                }
                Ok(false) => continue,
            }
        }
        Ok(Ok(false))
    }

    /// Step 4's bimodal follow-through: once a candidate commits, extends `known_roots`
    /// with its own declared dependency roots and turns its reached external imports into
    /// contributions and queued demand against those roots.
    fn after_commit(&mut self, frame: &Frame) -> Result<()> {
        let committed = frame.committed.as_ref().expect("called immediately after a commit");
        let (_internal, external) = reached_packages(&committed.tree, &frame.demanded)?;
        let external: Vec<String> = external.into_iter().collect();
        self.propagate_demand(&frame.root, &committed.manifest, &external);
        Ok(())
    }

    fn propagate_demand(&mut self, self_root: &str, manifest: &Manifest, external: &[String]) {
        self.known_roots.extend(manifest.dependencies.keys().cloned());
        let demand_map = demand_by_root(external, &self.known_roots);
        for (dep_root, demanded) in demand_map {
            if dep_root == self_root {
                continue;
            }
            let dependency = manifest.get(&dep_root).cloned();
            let source_override = dependency.as_ref().and_then(|d| d.source.clone());
            let constraint = dependency.map(|d| d.constraint).unwrap_or(Constraint::Any);
            self.contribute(&dep_root, constraint);
            self.enqueue_demand(dep_root, source_override, demanded);
        }
    }

    fn contribute(&mut self, root: &str, constraint: Constraint) {
        self.contributions.entry(root.to_string()).or_default().push(Contribution { constraint });
    }

    /// Pushes (or merges into an already-queued atom for) demand on `root`. A project
    /// named in more than one consumer's reach accumulates demand rather than being
    /// queued twice — the queue holds at most one pending entry per not-yet-committed
    /// root.
    fn enqueue_demand(&mut self, root: String, source_override: Option<String>, demanded: BTreeSet<String>) {
        if let Some(existing) = self.queue.iter_mut().find(|a| a.root == root) {
            existing.demanded.extend(demanded);
            if existing.source_override.is_none() {
                existing.source_override = source_override;
            }
            return;
        }
        self.queued_roots.insert(root.clone());
        self.queue.push_back(PendingAtom { root, source_override, demanded, resume: None });
    }

    /// An override always wins outright; otherwise the effective
    /// constraint is the intersection of every contribution recorded for `root` so far.
    fn effective_constraint(&self, root: &str) -> Constraint {
        if let Some(dep) = self.root_manifest.overrides.get(root) {
            return dep.constraint.clone();
        }
        self.contributions.get(root).map(|cs| cs.iter().fold(Constraint::Any, |acc, c| acc.intersect(&c.constraint))).unwrap_or(Constraint::Any)
    }

    async fn resolve_source(&self, root: &str, url_override: Option<&str>) -> Result<SourceRef> {
        let deduced = self.source_manager.deduce_project_root(root).await?;
        let url = url_override.map(str::to_string).unwrap_or(deduced.source_url);
        Ok(SourceRef::new(url, deduced.vcs))
    }

    /// Assembles the solution from the selection stack, in visitation
    /// order, each entry carrying the union of packages ever demanded from it.
    fn assemble_lock(&self) -> Lock {
        let mut projects = Vec::with_capacity(self.stack.len());
        for frame in &self.stack {
            let committed = frame.committed.as_ref().expect("stack only ever holds committed frames");
            let (internal, _external) =
                reached_packages(&committed.tree, &frame.demanded).expect("reached_packages is pure and succeeded for this demanded set at commit time");
            let project = match &frame.source_override {
                Some(source) => ProjectId::with_source(frame.root.clone(), source.clone()),
                None => ProjectId::new(frame.root.clone()),
            };
            projects.push(LockedProject::new(project, committed.version.clone(), internal));
        }
        Lock { projects, input_imports: self.root_input_imports.clone() }
    }

    /// Assembles the per-project failure ledger into a
    /// human-readable explanation.
    fn explain(&self) -> String {
        let mut lines = Vec::new();
        for (root, reasons) in &self.failures {
            for reason in reasons {
                lines.push(format!("{root}: {reason}"));
            }
        }
        if lines.is_empty() {
            lines.push("no candidate was ever attempted".to_string());
        }
        lines.join("; ")
    }
}
