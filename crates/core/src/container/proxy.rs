//! Client proxy capability
//!
//! Normal-scoped references and intercepted invocations route through a
//! wrapped view of the target instance. How the wrapping is constructed is
//! an embedding concern behind [`ProxyFactory`]; the core only relies on a
//! handle whose invocations pass through the interception chain.

use crate::container::bean::{Bean, Instance};
use crate::container::interception::{
    InterceptionChainBuilder, InterceptionType, TargetInvoker,
};
use crate::errors::ContainerError;
use std::sync::Arc;

/// A wrapped contextual instance
pub struct ProxyHandle {
    bean: Arc<Bean>,
    target: Instance,
    chains: Arc<InterceptionChainBuilder>,
}

impl ProxyHandle {
    /// The underlying contextual instance
    pub fn target(&self) -> &Instance {
        &self.target
    }

    pub fn bean(&self) -> &Arc<Bean> {
        &self.bean
    }

    /// Invoke a method through the bean's around-invoke chain. The caller
    /// supplies the terminal dispatch since the core cannot dispatch methods
    /// on opaque instances itself.
    pub fn invoke(
        &self,
        method: &str,
        parameters: Vec<Instance>,
        dispatch: TargetInvoker,
    ) -> Result<Option<Instance>, ContainerError> {
        let chain = self.chains.build_chain(
            &self.bean,
            method,
            InterceptionType::AroundInvoke,
            dispatch,
        )?;
        chain.invoke(parameters)
    }
}

/// Wraps target instances so invocations route through interception
pub trait ProxyFactory: Send + Sync {
    fn wrap(
        &self,
        bean: Arc<Bean>,
        target: Instance,
        chains: Arc<InterceptionChainBuilder>,
    ) -> Result<ProxyHandle, ContainerError>;
}

/// Pass-through factory: the handle fronts the instance directly, with no
/// generated wrapper object
#[derive(Debug, Default)]
pub struct DirectProxyFactory;

impl ProxyFactory for DirectProxyFactory {
    fn wrap(
        &self,
        bean: Arc<Bean>,
        target: Instance,
        chains: Arc<InterceptionChainBuilder>,
    ) -> Result<ProxyHandle, ContainerError> {
        Ok(ProxyHandle {
            bean,
            target,
            chains,
        })
    }
}
