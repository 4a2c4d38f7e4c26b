//! Toolchain abstraction.
//!
//! Classifies a compiler command into a family (GCC, Clang, MSVC) and emits
//! the family's flag syntax. Unknown compilers are driven with GCC-style
//! flags, which is what every non-MSVC toolchain in practice accepts.
//!
//! The [`CommandTransformer`] seam is applied after flag assembly: the
//! identity transformer passes invocations through untouched, while the MSVC
//! one (see [`msvc`]) wraps them in a `cmd.exe /c "call vcvarsall.bat ..."`
//! bootstrap because MSVC compilers only work inside the vendor's developer
//! environment.

pub mod msvc;

use std::path::{Path, PathBuf};

use flappy_platform::Arch;

use crate::error::BuildError;
use crate::manifest::{Language, OutputKind, Profile};
use crate::process::CommandSpec;

/// Compiler family, selected by token comparison on the compiler command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
  Gcc,
  Clang,
  Msvc,
  Unknown,
}

/// Commands that always mean MSVC, regardless of path.
const MSVC_TOKENS: &[&str] = &["cl", "cl.exe", "msvc", "clang-cl", "clang-cl.exe", "lib", "lib.exe"];

/// Classify a compiler command or absolute path into a [`Family`].
pub fn classify(compiler: &str) -> Family {
  let file = compiler.rsplit(['/', '\\']).next().unwrap_or(compiler).to_ascii_lowercase();

  if MSVC_TOKENS.contains(&file.as_str()) {
    return Family::Msvc;
  }
  // An absolute path under a Visual Studio toolset is MSVC even when the
  // binary has an unexpected name.
  let normalized = compiler.replace('\\', "/").to_ascii_lowercase();
  if normalized.contains("vc/auxiliary/build") {
    return Family::Msvc;
  }
  if file.contains("clang") {
    return Family::Clang;
  }
  if file == "cc" || file == "c++" || file.contains("gcc") || file.contains("g++") {
    return Family::Gcc;
  }
  Family::Unknown
}

impl Family {
  pub fn is_msvc(&self) -> bool {
    matches!(self, Family::Msvc)
  }

  /// Extension of object files produced by this family.
  pub fn object_extension(&self) -> &'static str {
    if self.is_msvc() { "obj" } else { "o" }
  }

  pub fn include_flag(&self, dir: &Path) -> String {
    if self.is_msvc() {
      format!("/I{}", dir.display())
    } else {
      format!("-I{}", dir.display())
    }
  }

  pub fn define_flag(&self, define: &str) -> String {
    if self.is_msvc() {
      format!("/D{}", define)
    } else {
      format!("-D{}", define)
    }
  }

  /// Standard-selection flags. MSVC takes `/std:` for both C and C++ and
  /// needs `/EHsc` to enable conforming C++ exception handling.
  pub fn std_flags(&self, standard: &str, language: Language) -> Vec<String> {
    if self.is_msvc() {
      let mut flags = vec![format!("/std:{}", standard)];
      if language == Language::Cpp {
        flags.push("/EHsc".to_string());
      }
      flags
    } else {
      vec![format!("-std={}", standard)]
    }
  }

  pub fn profile_flags(&self, profile: Profile) -> &'static [&'static str] {
    match (self.is_msvc(), profile) {
      (true, Profile::Debug) => &["/Zi", "/Od", "/MDd"],
      (true, Profile::Release) => &["/O2", "/DNDEBUG", "/MD"],
      (false, Profile::Debug) => &["-g", "-O0"],
      (false, Profile::Release) => &["-O3", "-DNDEBUG"],
    }
  }

  /// Architecture selection; MSVC gets its arch from vcvarsall instead.
  pub fn arch_flags(&self, arch: Arch) -> &'static [&'static str] {
    if self.is_msvc() {
      return &[];
    }
    match arch {
      Arch::X86 => &["-m32"],
      Arch::X64 => &["-m64"],
      Arch::Arm64 => &[],
    }
  }

  fn shared_flags(&self) -> &'static [&'static str] {
    if self.is_msvc() { &["/LD"] } else { &["-shared", "-fPIC"] }
  }

  fn debug_link_flags(&self, profile: Profile) -> &'static [&'static str] {
    match (self.is_msvc(), profile) {
      (true, Profile::Debug) => &["/Zi"],
      (false, Profile::Debug) => &["-g"],
      (_, Profile::Release) => &[],
    }
  }
}

/// Everything needed to compile one translation unit.
#[derive(Debug, Clone)]
pub struct CompileSpec<'a> {
  pub family: Family,
  pub compiler: &'a str,
  pub profile: Profile,
  pub arch: Arch,
  pub language: Language,
  pub standard: &'a str,
  pub includes: &'a [PathBuf],
  pub defines: &'a [String],
  pub flags: &'a [String],
  pub source: &'a Path,
  pub object: &'a Path,
}

/// Assemble the compile invocation for one translation unit.
///
/// Flag order: profile preset, arch, includes, defines, user flags, standard
/// token, then the source/object pair in the family's syntax.
pub fn compile_command(spec: &CompileSpec<'_>) -> CommandSpec {
  let mut cmd = CommandSpec::new(spec.compiler)
    .args(spec.family.profile_flags(spec.profile).iter().copied())
    .args(spec.family.arch_flags(spec.arch).iter().copied());

  for dir in spec.includes {
    cmd = cmd.arg(spec.family.include_flag(dir));
  }
  for define in spec.defines {
    cmd = cmd.arg(spec.family.define_flag(define));
  }
  cmd = cmd.args(spec.flags.iter().cloned());
  cmd = cmd.args(spec.family.std_flags(spec.standard, spec.language));

  if spec.family.is_msvc() {
    cmd
      .arg("/c")
      .arg(spec.source.display().to_string())
      .arg(format!("/Fo{}", spec.object.display()))
  } else {
    cmd
      .arg("-c")
      .arg(spec.source.display().to_string())
      .arg("-o")
      .arg(spec.object.display().to_string())
  }
}

/// Everything needed to link objects into the final artifact.
#[derive(Debug, Clone)]
pub struct LinkSpec<'a> {
  pub family: Family,
  pub compiler: &'a str,
  pub profile: Profile,
  pub arch: Arch,
  pub kind: OutputKind,
  pub objects: &'a [PathBuf],
  /// Resolved dependency libraries, appended after the objects.
  pub libs: &'a [PathBuf],
  pub output: &'a Path,
}

/// Assemble the link (or archive) invocation.
pub fn link_command(spec: &LinkSpec<'_>) -> CommandSpec {
  if spec.kind == OutputKind::StaticLib {
    return archive_command(spec);
  }

  let mut cmd = CommandSpec::new(spec.compiler).args(spec.family.arch_flags(spec.arch).iter().copied());

  if spec.kind == OutputKind::SharedLib {
    cmd = cmd.args(spec.family.shared_flags().iter().copied());
  }
  cmd = cmd.args(spec.family.debug_link_flags(spec.profile).iter().copied());

  for object in spec.objects {
    cmd = cmd.arg(object.display().to_string());
  }
  for lib in spec.libs {
    cmd = cmd.arg(lib.display().to_string());
  }

  if spec.family.is_msvc() {
    cmd.arg(format!("/Fe{}", spec.output.display()))
  } else {
    cmd.arg("-o").arg(spec.output.display().to_string())
  }
}

fn archive_command(spec: &LinkSpec<'_>) -> CommandSpec {
  if spec.family.is_msvc() {
    let mut cmd = CommandSpec::new("lib").arg(format!("/OUT:{}", spec.output.display()));
    for object in spec.objects {
      cmd = cmd.arg(object.display().to_string());
    }
    cmd
  } else {
    let mut cmd = CommandSpec::new("ar").arg("rcs").arg(spec.output.display().to_string());
    for object in spec.objects {
      cmd = cmd.arg(object.display().to_string());
    }
    cmd
  }
}

/// The platform-native suffix the output filename acquires, by artifact kind.
pub fn output_suffix(kind: OutputKind, family: Family, os: flappy_platform::Os) -> &'static str {
  use flappy_platform::Os;
  match kind {
    OutputKind::Executable => {
      if os.is_windows() {
        ".exe"
      } else {
        ""
      }
    }
    OutputKind::StaticLib => {
      if family.is_msvc() {
        ".lib"
      } else {
        ".a"
      }
    }
    OutputKind::SharedLib => match os {
      Os::Windows => ".dll",
      Os::MacOs => ".dylib",
      Os::Linux => ".so",
    },
  }
}

/// Rewrites assembled invocations just before they run.
///
/// GCC and Clang invocations pass through unchanged; MSVC ones are wrapped in
/// the developer-environment bootstrap.
pub trait CommandTransformer: Send + Sync {
  fn transform(&self, spec: CommandSpec) -> CommandSpec;
}

/// The no-op transformer used for every non-MSVC family.
pub struct Identity;

impl CommandTransformer for Identity {
  fn transform(&self, spec: CommandSpec) -> CommandSpec {
    spec
  }
}

/// The transformer for `family`, bootstrapping the MSVC environment when
/// needed. Fails with [`BuildError::Bootstrap`] when no Visual Studio
/// installation can be located.
pub fn transformer_for(family: Family, arch: Arch) -> Result<Box<dyn CommandTransformer>, BuildError> {
  if family.is_msvc() {
    Ok(Box::new(msvc::MsvcEnv::locate(arch)?))
  } else {
    Ok(Box::new(Identity))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classification_by_token() {
    assert_eq!(classify("g++"), Family::Gcc);
    assert_eq!(classify("gcc-13"), Family::Gcc);
    assert_eq!(classify("/usr/bin/cc"), Family::Gcc);
    assert_eq!(classify("aarch64-linux-gnu-g++"), Family::Gcc);
    assert_eq!(classify("clang++"), Family::Clang);
    assert_eq!(classify("/opt/llvm/bin/clang-18"), Family::Clang);
    assert_eq!(classify("cl"), Family::Msvc);
    assert_eq!(classify("cl.exe"), Family::Msvc);
    assert_eq!(classify("clang-cl"), Family::Msvc);
    assert_eq!(classify("lib.exe"), Family::Msvc);
    assert_eq!(classify("icc"), Family::Unknown);
  }

  #[test]
  fn msvc_by_installation_path() {
    let path = r"C:\Program Files\Microsoft Visual Studio\2022\Community\VC\Auxiliary\Build\..\..\Tools\MSVC\14.40\bin\Hostx64\x64\weird.exe";
    assert_eq!(classify(path), Family::Msvc);
  }

  #[test]
  fn std_flags_per_family() {
    assert_eq!(Family::Gcc.std_flags("c++20", Language::Cpp), vec!["-std=c++20"]);
    assert_eq!(Family::Gcc.std_flags("c17", Language::C), vec!["-std=c17"]);
    assert_eq!(
      Family::Msvc.std_flags("c++20", Language::Cpp),
      vec!["/std:c++20", "/EHsc"]
    );
    assert_eq!(Family::Msvc.std_flags("c17", Language::C), vec!["/std:c17"]);
  }

  #[test]
  fn gcc_compile_command_shape() {
    let includes = vec![PathBuf::from("/deps/fmt/include")];
    let defines = vec!["APP_VERSION=1".to_string()];
    let flags = vec!["-Wall".to_string()];
    let spec = CompileSpec {
      family: Family::Gcc,
      compiler: "g++",
      profile: Profile::Debug,
      arch: Arch::X64,
      language: Language::Cpp,
      standard: "c++20",
      includes: &includes,
      defines: &defines,
      flags: &flags,
      source: Path::new("src/main.cpp"),
      object: Path::new("obj/x64/debug/main.cpp.o"),
    };
    assert_eq!(
      compile_command(&spec).command_line(),
      "g++ -g -O0 -m64 -I/deps/fmt/include -DAPP_VERSION=1 -Wall -std=c++20 -c src/main.cpp -o obj/x64/debug/main.cpp.o"
    );
  }

  #[test]
  fn msvc_compile_command_shape() {
    let spec = CompileSpec {
      family: Family::Msvc,
      compiler: "cl",
      profile: Profile::Release,
      arch: Arch::X64,
      language: Language::Cpp,
      standard: "c++20",
      includes: &[],
      defines: &[],
      flags: &[],
      source: Path::new("src/main.cpp"),
      object: Path::new("obj/x64/release/main.cpp.obj"),
    };
    assert_eq!(
      compile_command(&spec).command_line(),
      "cl /O2 /DNDEBUG /MD /std:c++20 /EHsc /c src/main.cpp /Foobj/x64/release/main.cpp.obj"
    );
  }

  #[test]
  fn archive_uses_ar_or_lib() {
    let objects = vec![PathBuf::from("obj/a.o"), PathBuf::from("obj/b.o")];
    let spec = LinkSpec {
      family: Family::Gcc,
      compiler: "g++",
      profile: Profile::Release,
      arch: Arch::X64,
      kind: OutputKind::StaticLib,
      objects: &objects,
      libs: &[],
      output: Path::new("out/libapp.a"),
    };
    assert_eq!(link_command(&spec).command_line(), "ar rcs out/libapp.a obj/a.o obj/b.o");

    let spec = LinkSpec {
      family: Family::Msvc,
      ..spec
    };
    assert_eq!(
      link_command(&spec).command_line(),
      "lib /OUT:out/libapp.a obj/a.o obj/b.o"
    );
  }

  #[test]
  fn shared_link_gets_pic_flags() {
    let objects = vec![PathBuf::from("obj/a.o")];
    let libs = vec![PathBuf::from("/deps/z/libz.a")];
    let spec = LinkSpec {
      family: Family::Gcc,
      compiler: "g++",
      profile: Profile::Debug,
      arch: Arch::X64,
      kind: OutputKind::SharedLib,
      objects: &objects,
      libs: &libs,
      output: Path::new("out/app.so"),
    };
    assert_eq!(
      link_command(&spec).command_line(),
      "g++ -m64 -shared -fPIC -g obj/a.o /deps/z/libz.a -o out/app.so"
    );
  }

  #[test]
  fn output_suffixes() {
    use flappy_platform::Os;
    assert_eq!(output_suffix(OutputKind::Executable, Family::Gcc, Os::Linux), "");
    assert_eq!(output_suffix(OutputKind::Executable, Family::Msvc, Os::Windows), ".exe");
    assert_eq!(output_suffix(OutputKind::StaticLib, Family::Gcc, Os::Linux), ".a");
    assert_eq!(output_suffix(OutputKind::StaticLib, Family::Msvc, Os::Windows), ".lib");
    assert_eq!(output_suffix(OutputKind::SharedLib, Family::Gcc, Os::Linux), ".so");
    assert_eq!(output_suffix(OutputKind::SharedLib, Family::Clang, Os::MacOs), ".dylib");
    assert_eq!(output_suffix(OutputKind::SharedLib, Family::Msvc, Os::Windows), ".dll");
  }
}
