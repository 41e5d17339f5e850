// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod options;
mod settings;

pub mod consts;

pub use options::{
    combine_options, with_dir, with_env_vars, with_exit_hook, with_no_inherit_env, with_stderr,
    with_stdin, with_stdout, with_stdout_json_decoder, with_stdout_json_decoder_lenient,
    ExecOption, ExecOptions, InputSource, JsonSlot, OutputSink,
};
pub use settings::{LogLevel, Settings};
