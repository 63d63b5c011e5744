//! Resolution of a variant into a build plan.
//!
//! Runs the variant resolver, toolchain builder, signing resolver and tool
//! lookup, and reports every problem they find together. Nothing external
//! is launched until this succeeds.

use std::path::{Path, PathBuf};

use anyhow::Result;
use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::builder::plan::{
    expand_template, template_vars, BuildPlan, OutputLayout, PackagerCommand, ToolPaths,
    PLACEHOLDERS,
};
use crate::builder::signing::{SigningError, SigningResolver};
use crate::builder::toolchain::{ToolchainChainBuilder, ToolchainError};
use crate::core::config_value::ConfigSourceSet;
use crate::core::variant::{BuildType, ResolvedVariant};
use crate::core::workspace::Workspace;
use crate::deploy::DeployConfig;
use crate::resolver::{builtin_defaults, keys, ConfigError, VariantResolver};
use crate::util::context::GlobalContext;
use crate::util::diagnostic::Diagnostic;
use crate::util::process::resolve_tool;
use crate::util::secret::Secret;

/// Options for resolving a variant.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Variant to resolve (`debug`, `release` or a [variant.<name>] section)
    pub variant: String,

    /// `-P key=value` properties, later ones win
    pub properties: Vec<String>,

    /// `key=value` file read before the command-line properties
    pub properties_file: Option<PathBuf>,

    /// Also resolve deployment settings and the uploader
    pub deploy: bool,

    /// Debug keystore override (defaults to ~/.android/debug.keystore)
    pub debug_keystore: Option<PathBuf>,
}

/// One problem found during resolution.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
pub enum ResolutionProblem {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Signing(#[from] SigningError),

    #[error("no packager configured")]
    #[diagnostic(
        code(drydock::plan::no_packager),
        help("Add a [tools.packager] section with `program` and `args` to Drydock.toml")
    )]
    NoPackager,

    #[error("unknown packager placeholder(s): {}", .names.join(", "))]
    #[diagnostic(code(drydock::plan::unknown_placeholder))]
    UnknownPlaceholder { names: Vec<String> },
}

impl ResolutionProblem {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolutionProblem::Config(e) => e.to_diagnostic(),
            ResolutionProblem::Toolchain(e) => e.to_diagnostic(),
            ResolutionProblem::Signing(e) => e.to_diagnostic(),
            ResolutionProblem::NoPackager => Diagnostic::error(self.to_string())
                .with_suggestion("Add a [tools.packager] section to Drydock.toml"),
            ResolutionProblem::UnknownPlaceholder { .. } => Diagnostic::error(self.to_string())
                .with_context(format!("known placeholders: {}", PLACEHOLDERS.join(", "))),
        }
    }
}

/// Everything that prevents a variant from being built.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
#[error("cannot build variant `{variant}`: {} problem(s) found", .problems.len())]
#[diagnostic(code(drydock::resolve::failed))]
pub struct ResolutionError {
    pub variant: String,

    #[related]
    pub problems: Vec<ResolutionProblem>,
}

impl ResolutionError {
    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        self.problems.iter().map(|p| p.to_diagnostic()).collect()
    }
}

/// A successfully resolved variant.
#[derive(Debug)]
pub struct ResolvedBuild {
    pub plan: BuildPlan,
    pub sources: ConfigSourceSet,
    /// Non-fatal findings such as the version-code fallback
    pub warnings: Vec<Diagnostic>,
}

/// Build the config source set for a project, lowest precedence first.
pub fn collect_sources(ws: &Workspace, ctx: &GlobalContext, opts: &ResolveOptions) -> Result<ConfigSourceSet> {
    let manifest = ws.manifest();
    let mut sources = ConfigSourceSet::new();

    sources.add_defaults(builtin_defaults(), "built-in defaults");
    sources.extend(manifest.config_values());
    sources.add_revisions(&manifest.revisions);
    sources.add_environment(ctx.env_vars().iter().cloned());

    if let Some(file) = &opts.properties_file {
        let file = if file.is_absolute() {
            file.clone()
        } else {
            ctx.cwd().join(file)
        };
        sources.add_properties_file(&file)?;
    }
    for prop in &opts.properties {
        sources.add_property_arg(prop)?;
    }

    Ok(sources)
}

/// Locate a tool program. Relative paths resolve against the project root.
fn locate(program: &str, project_root: &Path) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        let candidate = project_root.join(path);
        return candidate.is_file().then_some(candidate);
    }
    resolve_tool(program)
}

fn locate_or_report(
    tool: &str,
    program: &str,
    project_root: &Path,
    problems: &mut Vec<ResolutionProblem>,
) -> PathBuf {
    match locate(program, project_root) {
        Some(path) => path,
        None => {
            problems.push(
                ToolchainError::MissingTool {
                    tool: tool.to_string(),
                    program: program.to_string(),
                }
                .into(),
            );
            PathBuf::from(program)
        }
    }
}

/// Resolve a variant of the workspace into a build plan.
///
/// Fails with a [`ResolutionError`] listing every problem, or with an I/O
/// error when a configuration file cannot be read.
pub fn resolve_build(ws: &Workspace, ctx: &GlobalContext, opts: &ResolveOptions) -> Result<ResolvedBuild> {
    let manifest = ws.manifest();
    let variant_name = opts.variant.as_str();
    let sources = collect_sources(ws, ctx, opts)?;
    let mut problems: Vec<ResolutionProblem> = Vec::new();

    let resolution = VariantResolver::new(&sources).resolve(variant_name);

    let mut signing_resolver = SigningResolver::new(ws.root());
    if let Some(path) = &opts.debug_keystore {
        signing_resolver = signing_resolver.with_debug_keystore(path);
    }
    let build_type = match &resolution {
        Ok(res) => Some(res.settings.build_type),
        Err(_) => BuildType::from_variant_name(variant_name),
    };
    let signing = build_type.map(|bt| signing_resolver.resolve(bt, &sources, variant_name));
    let (settings, warnings) = match resolution {
        Ok(res) => (Some(res.settings), res.warnings),
        Err(e) => {
            problems.push(e.into());
            (None, Vec::new())
        }
    };
    let signing = match signing {
        Some(Ok(identity)) => Some(identity),
        Some(Err(e)) => {
            problems.push(e.into());
            None
        }
        None => None,
    };

    let Some(settings) = settings else {
        return Err(ResolutionError {
            variant: variant_name.to_string(),
            problems,
        }
        .into());
    };

    let toolchain = match ToolchainChainBuilder::new(manifest.policy.package_manager).build(&settings) {
        Ok(spec) => Some(spec),
        Err(errors) => {
            problems.extend(errors.into_iter().map(ResolutionProblem::from));
            None
        }
    };

    let project_root = ws.root();
    let cmake = locate_or_report("cmake", &settings.tools.cmake, project_root, &mut problems);
    let apksigner = locate_or_report("apksigner", &settings.tools.apksigner, project_root, &mut problems);
    let packager = match &manifest.packager {
        Some(template) => Some((
            locate_or_report("packager", &template.program, project_root, &mut problems),
            template.args.clone(),
        )),
        None => {
            problems.push(ResolutionProblem::NoPackager);
            None
        }
    };

    let mut deploy = None;
    let mut uploader = None;
    if opts.deploy {
        let path = locate_or_report("uploader", &settings.tools.uploader, project_root, &mut problems);
        let app_secret = sources
            .lookup(keys::DEPLOY_APP_SECRET, variant_name)
            .map(|v| v.payload.render())
            .filter(|s| !s.trim().is_empty());

        let mut missing = ConfigError::new(variant_name);
        if settings.deploy.app_id.is_none() {
            missing.missing(keys::DEPLOY_APP_ID);
        }
        if app_secret.is_none() {
            missing.missing(keys::DEPLOY_APP_SECRET);
        }
        if !missing.is_empty() {
            problems.push(missing.into());
        }

        if let (Some(app_id), Some(app_secret)) = (&settings.deploy.app_id, app_secret) {
            deploy = Some(DeployConfig {
                uploader: path.clone(),
                subcommand: settings.deploy.subcommand.clone(),
                channel: settings.deploy.channel.clone(),
                app_id: app_id.clone(),
                app_secret: Secret::new(app_secret),
            });
        }
        uploader = Some(path);
    }

    let (Some(toolchain), Some(signing), Some((packager_program, packager_args))) =
        (toolchain, signing, packager)
    else {
        return Err(ResolutionError {
            variant: variant_name.to_string(),
            problems,
        }
        .into());
    };

    let variant = ResolvedVariant::assemble(settings, toolchain, signing);
    let layout = OutputLayout::new(
        ws.variant_dir(variant.name()),
        ws.name(),
        variant.name(),
        variant.build_type(),
    );
    let source_dir = ws.source_dir();

    let vars = template_vars(&variant, &layout, &source_dir);
    let args = match expand_template(&packager_args, &vars) {
        Ok(args) => args,
        Err(names) => {
            problems.push(ResolutionProblem::UnknownPlaceholder { names });
            Vec::new()
        }
    };

    if !problems.is_empty() {
        return Err(ResolutionError {
            variant: variant_name.to_string(),
            problems,
        }
        .into());
    }

    let plan = BuildPlan {
        variant,
        layout,
        project_root: project_root.to_path_buf(),
        source_dir,
        build_dir: manifest.build_dir(),
        tools: ToolPaths {
            cmake,
            apksigner,
            packager: packager_program.clone(),
            uploader,
        },
        packager: PackagerCommand {
            program: packager_program,
            args,
        },
        deploy,
    };

    tracing::debug!(
        "planned `{}` -> {}",
        plan.variant.name(),
        plan.artifact_path().display()
    );

    Ok(ResolvedBuild {
        plan,
        sources,
        warnings,
    })
}
