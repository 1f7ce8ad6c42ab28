//! Named wrappers for the gateway's RPC methods.
//!
//! Each wrapper forwards to [`GatewayClient::call`] with a fixed method
//! name. Parameters and payloads stay opaque; use
//! [`GatewayClient::call_as`] to bind a payload to a concrete type.

use crate::client::GatewayClient;
use crate::Result;
use serde::Serialize;
use serde_json::Value;

macro_rules! gateway_methods {
    ($($(#[$doc:meta])* $name:ident => $method:literal;)*) => {
        /// Wire names of every wrapped method, in declaration order.
        pub const METHODS: &[&str] = &[$($method),*];

        impl GatewayClient {
            $(
                $(#[$doc])*
                pub async fn $name<P>(&self, params: P) -> Result<Value>
                where
                    P: Serialize,
                {
                    self.call($method, params).await
                }
            )*
        }
    };
}

gateway_methods! {
    // Configuration
    /// Read the gateway configuration.
    get_config => "config.get";
    /// Replace configuration values.
    set_config => "config.set";
    /// Fetch the configuration schema.
    get_config_schema => "config.schema";
    /// Apply a full configuration document.
    apply_config => "config.apply";
    /// Merge a partial configuration document.
    patch_config => "config.patch";

    // Sessions
    /// List sessions.
    list_sessions => "sessions.list";
    /// Delete a session.
    delete_session => "sessions.delete";
    /// Preview session contents.
    preview_sessions => "sessions.preview";
    /// Resolve a session key.
    resolve_session => "sessions.resolve";
    /// Patch session settings.
    patch_session => "sessions.patch";
    /// Reset a session.
    reset_session => "sessions.reset";
    /// Compact a session transcript.
    compact_session => "sessions.compact";

    // Agents
    /// Read an agent workspace file.
    get_agent_file => "agents.files.get";
    /// List agent workspace files.
    list_agent_files => "agents.files.list";
    /// Write an agent workspace file.
    set_agent_file => "agents.files.set";
    /// List configured agents.
    list_agents => "agents.list";
    /// Fetch an agent's identity.
    get_agent_identity => "agent.identity";
    /// Run an agent turn.
    send_to_agent => "agent";
    /// Wait for an agent run to finish.
    wait_for_agent => "agent.wait";

    // Models and logs
    /// List available models.
    list_models => "models.list";
    /// Tail the gateway log.
    get_log_tail => "logs.tail";

    // Messaging
    /// Send an outbound message.
    send => "send";
    /// Send a poll.
    poll => "poll";
    /// Wake the agent.
    wake => "wake";

    // Onboarding wizard
    /// Start the onboarding wizard.
    start_wizard => "wizard.start";
    /// Advance the wizard.
    wizard_next => "wizard.next";
    /// Cancel the wizard.
    cancel_wizard => "wizard.cancel";
    /// Wizard status.
    get_wizard_status => "wizard.status";

    /// Set talk mode.
    set_talk_mode => "talk.mode";

    // Channels
    /// Channel status.
    get_channels_status => "channels.status";
    /// Log out of a channel.
    logout_channel => "channels.logout";
    /// Start a web login flow.
    start_web_login => "weblogin.start";
    /// Wait for a web login to complete.
    wait_for_web_login => "weblogin.wait";

    // Skills
    /// Skills status.
    get_skills_status => "skills.status";
    /// Binaries required by skills.
    get_skills_bins => "skills.bins";
    /// Install a skill.
    install_skill => "skills.install";
    /// Update a skill.
    update_skill => "skills.update";

    // Cron
    /// List cron jobs.
    list_cron_jobs => "cron.list";
    /// Scheduler status.
    get_cron_status => "cron.status";
    /// Add a cron job.
    add_cron_job => "cron.add";
    /// Update a cron job.
    update_cron_job => "cron.update";
    /// Remove a cron job.
    remove_cron_job => "cron.remove";
    /// Run a cron job now.
    run_cron_job => "cron.run";
    /// Run history of a cron job.
    get_cron_runs => "cron.runs";

    // Exec approvals
    /// Read the exec approval policy.
    get_exec_approvals => "exec.approvals.get";
    /// Replace the exec approval policy.
    set_exec_approvals => "exec.approvals.set";
    /// Read a node's exec approval policy.
    get_node_exec_approvals => "exec.approvals.node.get";
    /// Replace a node's exec approval policy.
    set_node_exec_approvals => "exec.approvals.node.set";
    /// Ask an operator to approve a command.
    request_exec_approval => "exec.approval.request";
    /// Answer a pending approval.
    resolve_exec_approval => "exec.approval.resolve";

    // Devices
    /// List device pairing requests.
    list_device_pairings => "device.pair.list";
    /// Approve a device pairing.
    approve_device_pairing => "device.pair.approve";
    /// Reject a device pairing.
    reject_device_pairing => "device.pair.reject";
    /// Rotate a device token.
    rotate_device_token => "device.token.rotate";
    /// Revoke a device token.
    revoke_device_token => "device.token.revoke";

    // Chat
    /// Chat history of a session.
    get_chat_history => "chat.history";
    /// Send a chat message.
    send_chat => "chat.send";
    /// Abort a running chat turn.
    abort_chat => "chat.abort";
    /// Inject a message into a chat transcript.
    inject_chat => "chat.inject";

    // Nodes
    /// Request node pairing.
    request_node_pairing => "node.pair.request";
    /// List node pairing requests.
    list_node_pairings => "node.pair.list";
    /// Approve a node pairing.
    approve_node_pairing => "node.pair.approve";
    /// Reject a node pairing.
    reject_node_pairing => "node.pair.reject";
    /// Verify a node pairing.
    verify_node_pairing => "node.pair.verify";
    /// Rename a node.
    rename_node => "node.rename";
    /// List nodes.
    list_nodes => "node.list";
    /// Describe a node.
    describe_node => "node.describe";
    /// Invoke a command on a node.
    invoke_node => "node.invoke";

    /// Run the gateway self-update.
    update_run => "update.run";
}
