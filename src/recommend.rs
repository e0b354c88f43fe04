//! Remediation recommendations.
//!
//! One line per failing or warning finding, tagged `【紧急】` for fails
//! and `【警告】` for warns, in report order. Output is deterministic:
//! same checks in, byte-identical lines out.

use crate::checks::Category;
use crate::report::{CheckResult, CheckStatus};

const URGENT_PREFIX: &str = "【紧急】";
const WARNING_PREFIX: &str = "【警告】";

/// Standing remediation advice per category.
fn advice(category: Category) -> &'static str {
    match category {
        Category::NonRootUser => "创建普通管理账户并通过 sudo 提权，避免直接使用 root",
        Category::UfwSecurity => "启用 UFW 防火墙并仅放行必要端口（ufw enable）",
        Category::SshSecurity => "加固 sshd 配置：禁用 root 登录与口令认证，仅保留密钥认证",
        Category::AccessControl => "收紧凭据文件权限（passwd 644、shadow 640、sudoers 440）",
        Category::PortSecurity => "关闭明文管理服务，数据库仅绑定回环地址或置于防火墙之后",
        Category::UnattendedUpgrades => "启用 unattended-upgrades 自动安装安全更新",
        Category::Fail2ban => "安装并启用 fail2ban，至少为 sshd 配置一个 jail",
        Category::RootkitDetection => "隔离主机并人工核实扫描结果，必要时重装系统",
        Category::SuspiciousProcesses => "核实并终止可疑进程，排查其启动来源与持久化方式",
        Category::ListeningPorts => "审查对外监听的服务，关闭不需要的端口",
        Category::CronJobs => "删除可疑计划任务并排查其写入来源",
        Category::SuspiciousFiles => "核实临时目录中的可执行文件，确认无害后清理",
        Category::SystemAccounts => "为系统账户设置 nologin，清理空口令账户",
        Category::NetworkConnections => "排查异常外联，必要时在防火墙封禁远端地址",
        Category::FileIntegrity => "比对发行版软件包校验和，确认核心文件未被替换",
        Category::LoginHistory => "轮换凭据并核实异常登录来源，考虑限制登录地域",
        Category::ImmutableFiles => "核实文件属性是否为管理员设置，否则用 chattr 移除并排查",
        Category::SuspiciousEnvVars => "移除动态链接器预加载配置并核查相关库文件",
    }
}

/// Builds the recommendation list from check results in report order.
///
/// Every `fail` or `warn` detail contributes one line; a check that
/// carries a failing status without details contributes a single line
/// for the category.
pub fn build(checks: &[CheckResult]) -> Vec<String> {
    let mut recommendations = Vec::new();

    for check in checks {
        match &check.details {
            Some(details) => {
                for detail in details {
                    let prefix = match detail.status {
                        CheckStatus::Fail => URGENT_PREFIX,
                        CheckStatus::Warn => WARNING_PREFIX,
                        _ => continue,
                    };
                    recommendations.push(format!(
                        "{prefix}[{}] {}：{}",
                        check.category.as_str(),
                        detail.message,
                        advice(check.category)
                    ));
                }
            }
            None => {
                let prefix = match check.status {
                    CheckStatus::Fail => URGENT_PREFIX,
                    CheckStatus::Warn => WARNING_PREFIX,
                    _ => continue,
                };
                recommendations.push(format!(
                    "{prefix}[{}] {}：{}",
                    check.category.as_str(),
                    check.message,
                    advice(check.category)
                ));
            }
        }
    }

    recommendations
}
