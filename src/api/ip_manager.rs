// ==========================================
// IP 目录管理系统 - IP 生命周期管理
// ==========================================
// 职责: 查询 (条件/分类子树)、发布、字段更新、打包导出、
//       父子挂接、层级导出、文本树视图、完整性检查
// 约定: 未找到返回 Ok(None) / Ok(false) / 空列表;
//       存储失败在操作边界记录 error 日志后以 Err 返回
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::export::{IpHierarchyNode, PackDocument};
use crate::api::tree_view;
use crate::config::config_manager::ConfigManager;
use crate::config::settings::CatalogSettings;
use crate::db::{configure_with_timeout, init_schema};
use crate::domain::ip::{Ip, IpUpdate};
use crate::engine::integrity::{IntegrityChecker, IntegrityReport};
use crate::query::composer::{compose_search, compose_type_tree};
use crate::query::criteria::SearchCriteria;
use crate::repository::error::RepositoryResult;
use crate::repository::gateway::{SqliteGateway, StorageGateway};
use crate::repository::ip_repo::IpRepository;
use crate::repository::process_repo::ProcessRepository;
use crate::repository::type_repo::TypeRepository;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 在操作边界记录存储失败
fn logged<T>(operation: &str, result: RepositoryResult<T>) -> ApiResult<T> {
    result.map_err(|e| {
        error!(operation = operation, error = %e, "操作失败");
        ApiError::from(e)
    })
}

// ==========================================
// IpManager - IP 管理器
// ==========================================
pub struct IpManager {
    gateway: Arc<dyn StorageGateway>,
    types: TypeRepository,
    ips: IpRepository,
    processes: ProcessRepository,
    settings: CatalogSettings,
}

impl IpManager {
    /// 基于已有网关创建 (schema 由调用方负责)
    pub fn from_gateway(gateway: Arc<dyn StorageGateway>, settings: CatalogSettings) -> Self {
        Self {
            types: TypeRepository::new(Arc::clone(&gateway))
                .with_policy(settings.dangling_parent_policy),
            ips: IpRepository::new(Arc::clone(&gateway)),
            processes: ProcessRepository::new(Arc::clone(&gateway)),
            gateway,
            settings,
        }
    }

    /// 打开 settings.db_path 指向的数据库
    ///
    /// - 应用 busy_timeout
    /// - 幂等建表
    /// - 叠加 config_kv 中的策略覆写
    pub fn open(settings: CatalogSettings) -> ApiResult<Self> {
        let gateway = SqliteGateway::new(&settings.db_path)?;
        {
            let conn = gateway.connection();
            let conn = conn
                .lock()
                .map_err(|e| ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", e)))?;
            configure_with_timeout(&conn, settings.busy_timeout_ms)
                .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
            init_schema(&conn).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        }

        let gateway: Arc<dyn StorageGateway> = Arc::new(gateway);
        let settings = ConfigManager::new(Arc::clone(&gateway)).apply_overrides(settings)?;
        info!(
            db_path = %settings.db_path,
            dangling_parent_policy = %settings.dangling_parent_policy,
            unknown_key_policy = %settings.unknown_key_policy,
            "IP 目录已打开"
        );
        Ok(Self::from_gateway(gateway, settings))
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    pub fn types(&self) -> &TypeRepository {
        &self.types
    }

    pub fn ips(&self) -> &IpRepository {
        &self.ips
    }

    pub fn processes(&self) -> &ProcessRepository {
        &self.processes
    }

    pub fn config(&self) -> ConfigManager {
        ConfigManager::new(Arc::clone(&self.gateway))
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按名称获取 IP
    pub fn fetch(&self, name: &str) -> ApiResult<Option<Ip>> {
        logged("fetch", self.ips.find_by_name(name))
    }

    /// 条件查询,结果按名称升序
    pub fn find(&self, criteria: &SearchCriteria) -> ApiResult<Vec<Ip>> {
        let query = compose_search(criteria);
        logged("find", self.ips.search(&query))
    }

    /// 字符串键条件查询; 未知键按 unknown_key_policy 处理
    pub fn find_by_pairs(&self, pairs: &[(&str, &str)]) -> ApiResult<Vec<Ip>> {
        let (criteria, _skipped) =
            SearchCriteria::from_pairs(pairs, self.settings.unknown_key_policy)?;
        self.find(&criteria)
    }

    /// 按分类子树查询
    ///
    /// # 参数
    /// - `type_name`: 分类名称,不存在时返回空列表
    /// - `include_descendants`: 是否包含全部后代分类
    pub fn find_by_type_tree(
        &self,
        type_name: &str,
        include_descendants: bool,
    ) -> ApiResult<Vec<Ip>> {
        logged("find_by_type_tree", self.find_by_type_tree_inner(type_name, include_descendants))
    }

    fn find_by_type_tree_inner(
        &self,
        type_name: &str,
        include_descendants: bool,
    ) -> RepositoryResult<Vec<Ip>> {
        let Some(root) = self.types.find_by_name(type_name)? else {
            warn!(type_name, "分类不存在,返回空结果");
            return Ok(Vec::new());
        };
        let Some(root_id) = root.id else {
            return Ok(Vec::new());
        };

        let mut type_ids = vec![root_id];
        if include_descendants {
            type_ids.extend(
                self.types
                    .find_descendants(&root)?
                    .into_iter()
                    .filter_map(|t| t.id),
            );
        }

        self.ips.search(&compose_type_tree(&type_ids))
    }

    // ==========================================
    // 生命周期
    // ==========================================

    /// 发布: 状态无条件切换为 production
    ///
    /// # 返回
    /// - Ok(false): IP 不存在
    pub fn release(&self, name: &str) -> ApiResult<bool> {
        let Some(mut ip) = self.fetch(name)? else {
            warn!(ip_name = name, "IP 不存在,无法发布");
            return Ok(false);
        };

        let previous = ip.status;
        ip.release();
        logged("release", self.ips.save(&mut ip))?;
        info!(ip_name = name, from = %previous, "IP 已发布为 production");
        Ok(true)
    }

    /// 按白名单字段更新
    ///
    /// # 返回
    /// - Ok(false): IP 不存在
    pub fn update(&self, name: &str, update: &IpUpdate) -> ApiResult<bool> {
        let Some(mut ip) = self.fetch(name)? else {
            warn!(ip_name = name, "IP 不存在,无法更新");
            return Ok(false);
        };

        let applied = update.apply_to(&mut ip);
        logged("update", self.ips.save(&mut ip))?;
        info!(ip_name = name, fields = ?applied, "IP 已更新");
        Ok(true)
    }

    /// 字符串键值更新
    ///
    /// 取值非法 (如 status = "bogus") 时在构造期失败,不写入存储;
    /// 白名单外字段按 unknown_key_policy 跳过或拒绝
    pub fn update_fields(&self, name: &str, fields: &[(&str, &str)]) -> ApiResult<bool> {
        let (update, skipped) = IpUpdate::from_fields(fields, self.settings.unknown_key_policy)
            .map_err(|e| {
                warn!(ip_name = name, error = %e, "更新字段校验失败");
                ApiError::from(e)
            })?;
        if !skipped.is_empty() {
            warn!(ip_name = name, skipped = ?skipped, "部分字段不在白名单中,已跳过");
        }
        self.update(name, &update)
    }

    /// 打包导出
    pub fn pack(&self, criteria: &SearchCriteria) -> ApiResult<PackDocument> {
        let ips = self.find(criteria)?;
        let document = logged("pack", PackDocument::assemble(&self.ips, criteria, ips))?;
        info!(
            pack_id = %document.metadata.pack_id,
            total_ips = document.metadata.total_ips,
            "IP 打包完成"
        );
        Ok(document)
    }

    // ==========================================
    // 层级
    // ==========================================

    /// 把 child 挂到名为 parent_name 的 IP 下
    ///
    /// # 返回
    /// - Ok(false): 父 IP 不存在
    pub fn add_child_ip(&self, parent_name: &str, child: &mut Ip) -> ApiResult<bool> {
        let Some(parent) = self.fetch(parent_name)? else {
            warn!(parent_name, "父 IP 不存在");
            return Ok(false);
        };
        logged("add_child_ip", self.ips.add_child(&parent, child))
    }

    /// 解除父子挂接
    ///
    /// # 返回
    /// - Ok(false): 任一方不存在,或两者不是父子关系
    pub fn remove_child_ip(&self, parent_name: &str, child_name: &str) -> ApiResult<bool> {
        let Some(parent) = self.fetch(parent_name)? else {
            warn!(parent_name, "父 IP 不存在");
            return Ok(false);
        };
        let Some(mut child) = self.fetch(child_name)? else {
            warn!(child_name, "子 IP 不存在");
            return Ok(false);
        };
        logged("remove_child_ip", self.ips.remove_child(&parent, &mut child))
    }

    /// 以某个 IP 为根的层级树
    pub fn get_ip_hierarchy(&self, name: &str) -> ApiResult<Option<IpHierarchyNode>> {
        let Some(ip) = self.fetch(name)? else {
            return Ok(None);
        };
        logged("get_ip_hierarchy", IpHierarchyNode::build(&self.ips, &ip)).map(Some)
    }

    // ==========================================
    // 文本树视图
    // ==========================================

    pub fn render_type_tree(&self) -> ApiResult<String> {
        logged("render_type_tree", tree_view::render_type_tree(&self.types))
    }

    /// IP 树; 不指定名称时输出全部顶层 IP 的树
    ///
    /// # 返回
    /// - Ok(None): 指定的 IP 不存在
    pub fn render_ip_tree(&self, name: Option<&str>, details: bool) -> ApiResult<Option<String>> {
        match name {
            Some(name) => {
                let Some(ip) = self.fetch(name)? else {
                    return Ok(None);
                };
                logged("render_ip_tree", tree_view::render_ip_tree(&self.ips, &ip, details))
                    .map(Some)
            }
            None => {
                let roots = logged("render_ip_tree", self.ips.find_roots())?;
                logged(
                    "render_ip_tree",
                    tree_view::render_ip_forest(&self.ips, &roots, details),
                )
                .map(Some)
            }
        }
    }

    /// 某工艺下顶层 IP 的树
    ///
    /// # 返回
    /// - Ok(None): 工艺不存在
    pub fn render_ip_tree_by_process(
        &self,
        process_name: &str,
        details: bool,
    ) -> ApiResult<Option<String>> {
        let Some(process_id) = logged(
            "render_ip_tree_by_process",
            self.processes.find_by_name(process_name),
        )?
        .and_then(|p| p.id) else {
            return Ok(None);
        };
        let ips = logged(
            "render_ip_tree_by_process",
            self.ips.find_by_process(process_id),
        )?;
        self.render_local_roots("render_ip_tree_by_process", ips, details)
            .map(Some)
    }

    /// 某分类下顶层 IP 的树
    ///
    /// # 返回
    /// - Ok(None): 分类不存在
    pub fn render_ip_tree_by_type(
        &self,
        type_name: &str,
        details: bool,
    ) -> ApiResult<Option<String>> {
        let Some(type_id) = logged("render_ip_tree_by_type", self.types.find_by_name(type_name))?
            .and_then(|t| t.id)
        else {
            return Ok(None);
        };
        let ips = logged("render_ip_tree_by_type", self.ips.find_by_type(type_id))?;
        self.render_local_roots("render_ip_tree_by_type", ips, details)
            .map(Some)
    }

    /// 过滤集合中无父节点的 IP 作为根
    fn render_local_roots(&self, operation: &str, ips: Vec<Ip>, details: bool) -> ApiResult<String> {
        let roots: Vec<Ip> = ips.into_iter().filter(Ip::is_root).collect();
        logged(operation, tree_view::render_ip_forest(&self.ips, &roots, details))
    }

    // ==========================================
    // 完整性
    // ==========================================

    /// 全量完整性检查
    pub fn check_integrity(&self) -> ApiResult<IntegrityReport> {
        let types = logged("check_integrity", self.types.find_all())?;
        let ips = logged("check_integrity", self.ips.find_all())?;
        let processes = logged("check_integrity", self.processes.find_all())?;
        Ok(IntegrityChecker::new().check(&types, &ips, &processes))
    }
}
