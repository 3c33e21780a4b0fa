use crate::error::Result;
use crate::models::advisor::{AdvisorContext, Directive};
use crate::models::uav::{TickEnvironment, UavTickReport};

/// 全てのシミュレーションエージェントが実装する基本インターフェース
pub trait IAgent {
    /// 1ティックの処理実行
    ///
    /// 終端状態のエージェントは何もせず `Ok(None)` を返します。
    /// 失敗した場合、呼び出し側は状態を反映してはいけません。
    fn tick(&mut self, env: &TickEnvironment, advisor: &dyn IAdvisor) -> Result<Option<UavTickReport>>;

    /// エージェントIDの取得
    fn get_id(&self) -> String;

    /// エージェントがアクティブかどうか（終端状態でない）
    fn is_active(&self) -> bool;
}

/// 状態遷移を決定するアドバイザーのインターフェース
///
/// 実装は決定的でなければなりません。同じ入力には常に同じ指示を返します。
pub trait IAdvisor {
    fn evaluate(&self, ctx: &AdvisorContext) -> Directive;
}
